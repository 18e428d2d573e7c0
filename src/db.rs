use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::models::{CourseGroup, Grade, GradeBoundary, Learner, NewBoundary, User};

/// SQLite-backed gradebook storage.
///
/// All reads of groups, learners and grades are scoped to the owning user;
/// a record that belongs to someone else is reported as [`AppError::NotFound`].
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file, creating its parent directory.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS course_groups(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class_level INTEGER NOT NULL,
                course_subject TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_course_groups_user ON course_groups(user_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS learners(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                group_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(group_id) REFERENCES course_groups(id) ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_learners_group ON learners(group_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS grades(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exam_title TEXT NOT NULL,
                numeric_grade REAL NOT NULL,
                date TEXT NOT NULL,
                learner_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_grades_learner ON grades(learner_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS grade_boundaries(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                grade INTEGER NOT NULL,
                lower_bound REAL NOT NULL,
                upper_bound REAL NOT NULL,
                group_id INTEGER NOT NULL,
                FOREIGN KEY(group_id) REFERENCES course_groups(id) ON DELETE CASCADE
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_grade_boundaries_group ON grade_boundaries(group_id)",
            [],
        )?;

        Ok(Store { conn })
    }

    // Users

    pub fn create_user(&self, username: &str, password_hash: &str) -> AppResult<i64> {
        self.conn.execute(
            "INSERT INTO users(username, password_hash) VALUES(?1, ?2)",
            params![username, password_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_user(&self, username: &str) -> AppResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // Course groups

    pub fn groups(&self, user_id: i64) -> AppResult<Vec<CourseGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_level, course_subject, user_id
             FROM course_groups WHERE user_id = ?1
             ORDER BY class_level, course_subject, id",
        )?;
        let rows = stmt.query_map(params![user_id], group_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn group(&self, user_id: i64, group_id: i64) -> AppResult<CourseGroup> {
        self.conn
            .query_row(
                "SELECT id, class_level, course_subject, user_id
                 FROM course_groups WHERE id = ?1 AND user_id = ?2",
                params![group_id, user_id],
                group_from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound)
    }

    pub fn insert_group(&self, user_id: i64, class_level: i64, subject: &str) -> AppResult<i64> {
        self.conn.execute(
            "INSERT INTO course_groups(class_level, course_subject, user_id) VALUES(?1, ?2, ?3)",
            params![class_level, subject, user_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_group(
        &self,
        user_id: i64,
        group_id: i64,
        class_level: i64,
        subject: &str,
    ) -> AppResult<()> {
        let changed = self.conn.execute(
            "UPDATE course_groups SET class_level = ?1, course_subject = ?2
             WHERE id = ?3 AND user_id = ?4",
            params![class_level, subject, group_id, user_id],
        )?;
        expect_one(changed)
    }

    /// Deletes the group together with its learners, their grades and the
    /// group's boundary table.
    pub fn delete_group(&self, user_id: i64, group_id: i64) -> AppResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM course_groups WHERE id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        expect_one(changed)
    }

    // Learners

    pub fn learners(&self, group_id: i64) -> AppResult<Vec<Learner>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, group_id, user_id
             FROM learners WHERE group_id = ?1
             ORDER BY last_name, first_name, id",
        )?;
        let rows = stmt.query_map(params![group_id], learner_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn learner(&self, user_id: i64, learner_id: i64) -> AppResult<Learner> {
        self.conn
            .query_row(
                "SELECT id, first_name, last_name, group_id, user_id
                 FROM learners WHERE id = ?1 AND user_id = ?2",
                params![learner_id, user_id],
                learner_from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound)
    }

    pub fn insert_learner(
        &self,
        user_id: i64,
        group_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<i64> {
        self.conn.execute(
            "INSERT INTO learners(first_name, last_name, group_id, user_id) VALUES(?1, ?2, ?3, ?4)",
            params![first_name, last_name, group_id, user_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_learner(
        &self,
        user_id: i64,
        learner_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<()> {
        let changed = self.conn.execute(
            "UPDATE learners SET first_name = ?1, last_name = ?2 WHERE id = ?3 AND user_id = ?4",
            params![first_name, last_name, learner_id, user_id],
        )?;
        expect_one(changed)
    }

    pub fn delete_learner(&self, user_id: i64, learner_id: i64) -> AppResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM learners WHERE id = ?1 AND user_id = ?2",
            params![learner_id, user_id],
        )?;
        expect_one(changed)
    }

    // Grades

    /// Grades of one learner in date order.
    pub fn grades(&self, learner_id: i64) -> AppResult<Vec<Grade>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, exam_title, numeric_grade, learner_id, user_id
             FROM grades WHERE learner_id = ?1
             ORDER BY date, id",
        )?;
        let rows = stmt.query_map(params![learner_id], grade_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every grade of every learner in a group, in date order.
    pub fn group_grades(&self, group_id: i64) -> AppResult<Vec<Grade>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.date, g.exam_title, g.numeric_grade, g.learner_id, g.user_id
             FROM grades g JOIN learners l ON l.id = g.learner_id
             WHERE l.group_id = ?1
             ORDER BY g.date, g.id",
        )?;
        let rows = stmt.query_map(params![group_id], grade_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn grade(&self, user_id: i64, grade_id: i64) -> AppResult<Grade> {
        self.conn
            .query_row(
                "SELECT id, date, exam_title, numeric_grade, learner_id, user_id
                 FROM grades WHERE id = ?1 AND user_id = ?2",
                params![grade_id, user_id],
                grade_from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound)
    }

    pub fn insert_grade(
        &self,
        user_id: i64,
        learner_id: i64,
        exam_title: &str,
        numeric_grade: f64,
        date: NaiveDate,
    ) -> AppResult<i64> {
        self.conn.execute(
            "INSERT INTO grades(exam_title, numeric_grade, date, learner_id, user_id)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![exam_title, numeric_grade, date, learner_id, user_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_grade(
        &self,
        user_id: i64,
        grade_id: i64,
        exam_title: &str,
        numeric_grade: f64,
        date: NaiveDate,
    ) -> AppResult<()> {
        let changed = self.conn.execute(
            "UPDATE grades SET exam_title = ?1, numeric_grade = ?2, date = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![exam_title, numeric_grade, date, grade_id, user_id],
        )?;
        expect_one(changed)
    }

    pub fn delete_grade(&self, user_id: i64, grade_id: i64) -> AppResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM grades WHERE id = ?1 AND user_id = ?2",
            params![grade_id, user_id],
        )?;
        expect_one(changed)
    }

    // Grade boundaries

    /// Boundary table of a group, lowest band first.
    pub fn boundaries(&self, group_id: i64) -> AppResult<Vec<GradeBoundary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, grade, lower_bound, upper_bound, group_id
             FROM grade_boundaries WHERE group_id = ?1
             ORDER BY lower_bound, id",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok(GradeBoundary {
                id: row.get(0)?,
                subject: row.get(1)?,
                grade: row.get(2)?,
                lower_bound: row.get(3)?,
                upper_bound: row.get(4)?,
                group_id: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Swaps the group's whole boundary table in one transaction.
    pub fn replace_boundaries(
        &self,
        group_id: i64,
        subject: &str,
        rows: &[NewBoundary],
    ) -> AppResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM grade_boundaries WHERE group_id = ?1",
            params![group_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO grade_boundaries(subject, grade, lower_bound, upper_bound, group_id)
                 VALUES(?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in rows {
                stmt.execute(params![
                    subject,
                    row.grade,
                    row.lower_bound,
                    row.upper_bound,
                    group_id
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn expect_one(changed: usize) -> AppResult<()> {
    if changed == 0 {
        Err(AppError::NotFound)
    } else {
        Ok(())
    }
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<CourseGroup> {
    Ok(CourseGroup {
        id: row.get(0)?,
        class_level: row.get(1)?,
        course_subject: row.get(2)?,
        user_id: row.get(3)?,
    })
}

fn learner_from_row(row: &Row<'_>) -> rusqlite::Result<Learner> {
    Ok(Learner {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        group_id: row.get(3)?,
        user_id: row.get(4)?,
    })
}

fn grade_from_row(row: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: row.get(0)?,
        date: row.get(1)?,
        exam_title: row.get(2)?,
        numeric_grade: row.get(3)?,
        learner_id: row.get(4)?,
        user_id: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Store, i64, i64, i64) {
        let store = Store::open_in_memory().expect("open store");
        let user = store.create_user("teacher", "hash").expect("user");
        let group = store.insert_group(user, 12, "Maths AA HL").expect("group");
        let learner = store
            .insert_learner(user, group, "Ada", "Lovelace")
            .expect("learner");
        (store, user, group, learner)
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn deleting_group_cascades_to_learners_grades_and_boundaries() {
        let (store, user, group, learner) = seeded();
        store
            .insert_grade(user, learner, "Paper 1", 80.0, day("2024-01-10"))
            .expect("grade");
        store
            .replace_boundaries(
                group,
                "Maths AA HL",
                &[NewBoundary {
                    grade: 7,
                    lower_bound: 80.0,
                    upper_bound: 100.0,
                }],
            )
            .expect("boundaries");

        store.delete_group(user, group).expect("delete");

        assert!(matches!(store.learner(user, learner), Err(AppError::NotFound)));
        assert!(store.grades(learner).expect("grades").is_empty());
        assert!(store.boundaries(group).expect("boundaries").is_empty());
    }

    #[test]
    fn deleting_learner_removes_its_grades_only() {
        let (store, user, group, learner) = seeded();
        let other = store.insert_learner(user, group, "Alan", "Turing").expect("learner");
        store
            .insert_grade(user, learner, "Paper 1", 70.0, day("2024-02-01"))
            .expect("grade");
        store
            .insert_grade(user, other, "Paper 2", 60.0, day("2024-02-01"))
            .expect("grade");

        store.delete_learner(user, learner).expect("delete");

        assert!(store.grades(learner).expect("grades").is_empty());
        assert_eq!(store.grades(other).expect("grades").len(), 1);
        assert_eq!(store.group(user, group).expect("group").id, group);
    }

    #[test]
    fn records_are_scoped_to_their_owner() {
        let (store, _user, group, learner) = seeded();
        let intruder = store.create_user("intruder", "hash").expect("user");

        assert!(matches!(store.group(intruder, group), Err(AppError::NotFound)));
        assert!(matches!(store.learner(intruder, learner), Err(AppError::NotFound)));
        assert!(matches!(
            store.delete_group(intruder, group),
            Err(AppError::NotFound)
        ));
        assert!(store.groups(intruder).expect("groups").is_empty());
    }

    #[test]
    fn grades_come_back_in_date_order() {
        let (store, user, group, learner) = seeded();
        store
            .insert_grade(user, learner, "Paper 2", 50.0, day("2024-03-05"))
            .expect("grade");
        store
            .insert_grade(user, learner, "Paper 1", 90.0, day("2024-01-05"))
            .expect("grade");

        let dates: Vec<_> = store
            .group_grades(group)
            .expect("grades")
            .into_iter()
            .map(|g| g.date)
            .collect();
        assert_eq!(dates, vec![day("2024-01-05"), day("2024-03-05")]);
    }

    #[test]
    fn replacing_boundaries_drops_the_old_table() {
        let (store, _user, group, _learner) = seeded();
        let band = |grade, lower, upper| NewBoundary {
            grade,
            lower_bound: lower,
            upper_bound: upper,
        };
        store
            .replace_boundaries(group, "Maths AA HL", &[band(7, 90.0, 100.0), band(6, 80.0, 89.0)])
            .expect("first upload");
        store
            .replace_boundaries(group, "Maths AA HL", &[band(7, 85.0, 100.0)])
            .expect("second upload");

        let table = store.boundaries(group).expect("boundaries");
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].lower_bound, 85.0);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let store = Store::open_in_memory().expect("open store");
        store.create_user("sam", "hash").expect("first");
        assert!(store.create_user("sam", "hash").is_err());
    }
}
