//! Mark record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Look up, insert and overwrite mark records addressed by their triple.
//! - List the marks of one subject/exam joined with student identity.
//!
//! # Invariants
//! - At most one row exists per `(student_id, subject_id, exam_type)`; the
//!   `idx_marks_triple` unique index rejects a second insert.
//! - Methods run on whatever connection or transaction they are given.

use crate::db::DbError;
use crate::model::mark::{MarkId, MarkKey, MarkRecord, NewMark};
use crate::model::roster::SubjectId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MARK_SELECT_SQL: &str = "SELECT
    id,
    student_id,
    subject_id,
    exam_type,
    marks_obtained,
    max_marks
FROM marks";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for mark and roster persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Storage transport or bootstrap failure.
    Db(DbError),
    /// A table constraint rejected the write (duplicate triple, unknown
    /// student/subject, negative score).
    ConstraintViolation(String),
    /// Update target does not exist.
    NotFound(MarkId),
    /// Caller input rejected before reaching SQL.
    InvalidInput(&'static str),
    /// Persisted row breaks a model invariant.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::NotFound(id) => write!(f, "mark not found: {id}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted mark data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_constraint_violation() {
            return Self::ConstraintViolation(value.to_string());
        }
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Read model for the marks listing: one record plus its student's identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkView {
    #[serde(flatten)]
    pub record: MarkRecord,
    pub student_name: String,
    pub roll_number: String,
}

/// Record store contract used by the reconciliation engine and read path.
pub trait MarkRepository {
    /// Finds the record for one triple. No side effects.
    fn find_by_triple(&self, key: &MarkKey) -> RepoResult<Option<MarkRecord>>;
    /// Inserts a record for a triple that has none yet.
    fn insert(&self, mark: &NewMark) -> RepoResult<MarkId>;
    /// Overwrites score and max score in place.
    fn update(&self, id: MarkId, obtained_score: f64, max_score: f64) -> RepoResult<()>;
    /// Lists one subject/exam, ordered by roll number then record id.
    fn list_by_exam(&self, subject_id: SubjectId, exam_type: &str) -> RepoResult<Vec<MarkView>>;
}

/// SQLite-backed mark store.
///
/// Accepts a plain connection or a `Transaction` (through deref).
pub struct SqliteMarkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMarkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MarkRepository for SqliteMarkRepository<'_> {
    fn find_by_triple(&self, key: &MarkKey) -> RepoResult<Option<MarkRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{MARK_SELECT_SQL}
             WHERE student_id = ?1
               AND subject_id = ?2
               AND exam_type = ?3;"
        ))?;

        let record = stmt
            .query_row(
                params![key.student_id, key.subject_id, key.exam_type.as_str()],
                |row| Ok(read_mark_columns(row)),
            )
            .optional()?;

        match record {
            Some(columns) => Ok(Some(check_record(columns?)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, mark: &NewMark) -> RepoResult<MarkId> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO marks (
                student_id,
                subject_id,
                exam_type,
                marks_obtained,
                max_marks
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        stmt.execute(params![
            mark.key.student_id,
            mark.key.subject_id,
            mark.key.exam_type.as_str(),
            mark.obtained_score,
            mark.max_score,
        ])?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, id: MarkId, obtained_score: f64, max_score: f64) -> RepoResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "UPDATE marks
             SET
                marks_obtained = ?1,
                max_marks = ?2
             WHERE id = ?3;",
        )?;
        let changed = stmt.execute(params![obtained_score, max_score, id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn list_by_exam(&self, subject_id: SubjectId, exam_type: &str) -> RepoResult<Vec<MarkView>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT
                m.id,
                m.student_id,
                m.subject_id,
                m.exam_type,
                m.marks_obtained,
                m.max_marks,
                s.name AS student_name,
                s.roll_number
             FROM marks m
             JOIN students s ON m.student_id = s.id
             WHERE m.subject_id = ?1
               AND m.exam_type = ?2
             ORDER BY s.roll_number ASC, m.id ASC;",
        )?;

        let mut rows = stmt.query(params![subject_id, exam_type])?;
        let mut views = Vec::new();
        while let Some(row) = rows.next()? {
            let record = check_record(read_mark_columns(row)?)?;
            views.push(MarkView {
                record,
                student_name: row.get("student_name")?,
                roll_number: row.get("roll_number")?,
            });
        }

        Ok(views)
    }
}

fn read_mark_columns(row: &Row<'_>) -> RepoResult<MarkRecord> {
    Ok(MarkRecord {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        subject_id: row.get("subject_id")?,
        exam_type: row.get("exam_type")?,
        obtained_score: row.get("marks_obtained")?,
        max_score: row.get("max_marks")?,
    })
}

fn check_record(record: MarkRecord) -> RepoResult<MarkRecord> {
    if !record.obtained_score.is_finite() || record.obtained_score < 0.0 {
        return Err(RepoError::InvalidData(format!(
            "invalid marks_obtained `{}` in marks.id={}",
            record.obtained_score, record.id
        )));
    }
    Ok(record)
}
