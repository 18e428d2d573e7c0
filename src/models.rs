use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Subjects a course group may be created for.
pub const SUBJECTS: [&str; 2] = ["Maths AA SL", "Maths AA HL"];

/// Assessments a grade may be recorded against.
pub const ASSESSMENTS: [&str; 4] = ["Paper 1", "Paper 2", "Paper 3", "Cycle Test"];

/// Registered application user
///
/// Every course group, learner and grade is owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Database id
    pub id: i64,

    /// Unique login name
    pub username: String,

    /// Argon2 PHC string of the user's password
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// A class or year group, e.g. "Year 12 - Maths AA HL"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseGroup {
    pub id: i64,
    /// Year group, 1 through 13
    pub class_level: i64,
    pub course_subject: String,
    pub user_id: i64,
}

/// A student enrolled in one course group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub group_id: i64,
    pub user_id: i64,
}

impl Learner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One scored assessment for a learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub date: NaiveDate,
    pub exam_title: String,
    pub numeric_grade: f64,
    pub learner_id: i64,
    pub user_id: i64,
}

/// One band of a group's boundary table.
///
/// A score belongs to the band when `lower_bound <= score <= upper_bound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBoundary {
    pub id: i64,
    pub subject: String,
    pub grade: i64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub group_id: i64,
}

/// A boundary row parsed from an upload, before it has a database id
#[derive(Debug, Clone, PartialEq)]
pub struct NewBoundary {
    pub grade: i64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}
