//! Roster (student/subject) repository.
//!
//! # Responsibility
//! - Seed and read the student and subject identities that marks reference.
//!
//! # Invariants
//! - Roll numbers and subject names are unique and stored trimmed.

use crate::model::roster::{Student, StudentId, Subject, SubjectId};
use crate::repo::mark_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Roster persistence contract.
pub trait RosterRepository {
    fn create_student(
        &self,
        roll_number: &str,
        name: &str,
        email: Option<&str>,
    ) -> RepoResult<StudentId>;
    fn create_subject(&self, name: &str) -> RepoResult<SubjectId>;
    fn get_student(&self, id: StudentId) -> RepoResult<Option<Student>>;
    fn get_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>>;
    /// All students ordered by roll number.
    fn list_students(&self) -> RepoResult<Vec<Student>>;
}

/// SQLite-backed roster repository.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn create_student(
        &self,
        roll_number: &str,
        name: &str,
        email: Option<&str>,
    ) -> RepoResult<StudentId> {
        let roll_number = required(roll_number, "roll_number is required")?;
        let name = required(name, "student name is required")?;
        let email = email.map(str::trim).filter(|value| !value.is_empty());

        self.conn.execute(
            "INSERT INTO students (roll_number, name, email) VALUES (?1, ?2, ?3);",
            params![roll_number, name, email],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_subject(&self, name: &str) -> RepoResult<SubjectId> {
        let name = required(name, "subject name is required")?;
        self.conn
            .execute("INSERT INTO subjects (name) VALUES (?1);", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_student(&self, id: StudentId) -> RepoResult<Option<Student>> {
        let student = self
            .conn
            .query_row(
                "SELECT id, roll_number, name, email FROM students WHERE id = ?1;",
                [id],
                parse_student_row,
            )
            .optional()?;
        Ok(student)
    }

    fn get_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>> {
        let subject = self
            .conn
            .query_row("SELECT id, name FROM subjects WHERE id = ?1;", [id], |row| {
                Ok(Subject {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })
            .optional()?;
        Ok(subject)
    }

    fn list_students(&self) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, roll_number, name, email
             FROM students
             ORDER BY roll_number ASC, id ASC;",
        )?;
        let students = stmt
            .query_map([], parse_student_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }
}

fn parse_student_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get("id")?,
        roll_number: row.get("roll_number")?,
        name: row.get("name")?,
        email: row.get("email")?,
    })
}

fn required<'a>(value: &'a str, message: &'static str) -> RepoResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidInput(message));
    }
    Ok(trimmed)
}
