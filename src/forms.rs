use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{ASSESSMENTS, SUBJECTS};

const NAME_MAX_CHARS: usize = 20;

/// Form data for adding or editing a course group
#[derive(Debug, Deserialize)]
pub struct GroupForm {
    #[serde(default)]
    pub year_group: String,
    #[serde(default)]
    pub subject: String,
}

/// Form data for adding or editing a learner
#[derive(Debug, Deserialize)]
pub struct LearnerForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
}

/// Form data for adding or editing a grade
#[derive(Debug, Deserialize)]
pub struct GradeForm {
    #[serde(default)]
    pub assessment_name: String,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub date: String,
}

/// Form data for registration
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Form data for login
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, PartialEq)]
pub struct ValidGroup {
    pub class_level: i64,
    pub subject: String,
}

#[derive(Debug, PartialEq)]
pub struct ValidLearner {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, PartialEq)]
pub struct ValidGrade {
    pub exam_title: String,
    pub numeric_grade: f64,
    pub date: NaiveDate,
}

#[derive(Debug, PartialEq)]
pub struct ValidRegistration {
    pub username: String,
    pub password: String,
}

/// Error messages are returned as `Err(String)` and rendered on the form.
pub fn validate_group(form: &GroupForm) -> Result<ValidGroup, String> {
    let class_level = form
        .year_group
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|level| (1..=13).contains(level))
        .ok_or_else(|| "Year group must be an integer between 1 and 13.".to_string())?;

    if !SUBJECTS.contains(&form.subject.as_str()) {
        return Err("Invalid subject selected.".to_string());
    }

    Ok(ValidGroup {
        class_level,
        subject: form.subject.clone(),
    })
}

pub fn validate_learner(form: &LearnerForm) -> Result<ValidLearner, String> {
    let first_name = form.name.trim();
    let last_name = form.surname.trim();

    if first_name.is_empty() || last_name.is_empty() {
        return Err("Name and Surname are required.".to_string());
    }
    if first_name.chars().count() > NAME_MAX_CHARS || last_name.chars().count() > NAME_MAX_CHARS {
        return Err("Name and Surname must be 20 characters or fewer.".to_string());
    }

    Ok(ValidLearner {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    })
}

/// `today` bounds the assessment date; grades cannot be dated in the future.
pub fn validate_grade(form: &GradeForm, today: NaiveDate) -> Result<ValidGrade, String> {
    if !ASSESSMENTS.contains(&form.assessment_name.as_str()) {
        return Err("Invalid assessment name selected.".to_string());
    }

    let numeric_grade = form
        .score
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|score| (0.0..=100.0).contains(score))
        .ok_or_else(|| "Score must be a number between 0 and 100.".to_string())?;

    let date = NaiveDate::parse_from_str(form.date.trim(), "%Y-%m-%d")
        .map_err(|_| "Invalid date format.".to_string())?;
    if date > today {
        return Err("Date cannot be in the future.".to_string());
    }

    Ok(ValidGrade {
        exam_title: form.assessment_name.clone(),
        numeric_grade,
        date,
    })
}

pub fn validate_registration(form: &RegisterForm) -> Result<ValidRegistration, String> {
    let username = form.username.trim();
    let password = form.password.trim();
    let confirm = form.confirm_password.trim();

    if username.is_empty() || password.is_empty() || confirm.is_empty() {
        return Err("All fields are required.".to_string());
    }
    if password != confirm {
        return Err("Passwords do not match.".to_string());
    }

    Ok(ValidRegistration {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn grade_form(assessment: &str, score: &str, date: &str) -> GradeForm {
        GradeForm {
            assessment_name: assessment.to_string(),
            score: score.to_string(),
            date: date.to_string(),
        }
    }

    #[test]
    fn year_group_must_be_between_1_and_13() {
        let form = |year: &str| GroupForm {
            year_group: year.to_string(),
            subject: "Maths AA SL".to_string(),
        };
        assert_eq!(validate_group(&form("13")).unwrap().class_level, 13);
        assert_eq!(validate_group(&form(" 1 ")).unwrap().class_level, 1);
        for bad in ["0", "14", "twelve", "", "12.5"] {
            assert_eq!(
                validate_group(&form(bad)).unwrap_err(),
                "Year group must be an integer between 1 and 13."
            );
        }
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let form = GroupForm {
            year_group: "11".to_string(),
            subject: "History".to_string(),
        };
        assert_eq!(validate_group(&form).unwrap_err(), "Invalid subject selected.");
    }

    #[test]
    fn learner_names_are_trimmed_and_limited() {
        let ok = validate_learner(&LearnerForm {
            name: "  Ada ".to_string(),
            surname: "Lovelace".to_string(),
        })
        .unwrap();
        assert_eq!(ok.first_name, "Ada");

        let blank = validate_learner(&LearnerForm {
            name: "   ".to_string(),
            surname: "Lovelace".to_string(),
        });
        assert_eq!(blank.unwrap_err(), "Name and Surname are required.");

        let long = validate_learner(&LearnerForm {
            name: "A".repeat(21),
            surname: "Lovelace".to_string(),
        });
        assert_eq!(
            long.unwrap_err(),
            "Name and Surname must be 20 characters or fewer."
        );
    }

    #[test]
    fn twenty_multibyte_characters_fit() {
        let form = LearnerForm {
            name: "é".repeat(20),
            surname: "Ø".to_string(),
        };
        assert!(validate_learner(&form).is_ok());
    }

    #[test]
    fn grade_rules() {
        let ok = validate_grade(&grade_form("Paper 2", "88.5", "2024-06-01"), today()).unwrap();
        assert_eq!(ok.numeric_grade, 88.5);

        assert_eq!(
            validate_grade(&grade_form("Paper 9", "50", "2024-01-01"), today()).unwrap_err(),
            "Invalid assessment name selected."
        );
        for score in ["-1", "100.1", "abc", ""] {
            assert_eq!(
                validate_grade(&grade_form("Paper 1", score, "2024-01-01"), today()).unwrap_err(),
                "Score must be a number between 0 and 100."
            );
        }
        assert_eq!(
            validate_grade(&grade_form("Paper 1", "50", "01/02/2024"), today()).unwrap_err(),
            "Invalid date format."
        );
        assert_eq!(
            validate_grade(&grade_form("Cycle Test", "50", "2024-06-02"), today()).unwrap_err(),
            "Date cannot be in the future."
        );
    }

    #[test]
    fn registration_requires_matching_passwords() {
        let form = RegisterForm {
            username: "sam".to_string(),
            password: "secret".to_string(),
            confirm_password: "secreT".to_string(),
        };
        assert_eq!(validate_registration(&form).unwrap_err(), "Passwords do not match.");

        let empty = RegisterForm {
            username: "".to_string(),
            password: "secret".to_string(),
            confirm_password: "secret".to_string(),
        };
        assert_eq!(validate_registration(&empty).unwrap_err(), "All fields are required.");
    }
}
