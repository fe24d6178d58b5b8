//! Mark record and mark batch domain model.
//!
//! # Responsibility
//! - Define the stored `MarkRecord` and its `MarkKey` triple.
//! - Define `MarkBatch`, the validated unit of work applied by the engine.
//!
//! # Invariants
//! - `obtained_score` is finite and never negative.
//! - `max_score` is shared by every row of a batch; `obtained_score` is not
//!   checked against it.
//! - A batch always carries at least one row.

use super::roster::{StudentId, SubjectId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier of a stored mark record.
pub type MarkId = i64;

/// Uniqueness key of a mark record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkKey {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub exam_type: String,
}

impl Display for MarkKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "student={} subject={} exam_type={}",
            self.student_id, self.subject_id, self.exam_type
        )
    }
}

/// One persisted mark for a `(student, subject, exam_type)` triple.
///
/// Serialized with the column names used on the wire (`marks_obtained`,
/// `max_marks`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRecord {
    pub id: MarkId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub exam_type: String,
    #[serde(rename = "marks_obtained")]
    pub obtained_score: f64,
    #[serde(rename = "max_marks")]
    pub max_score: f64,
}

impl MarkRecord {
    pub fn key(&self) -> MarkKey {
        MarkKey {
            student_id: self.student_id,
            subject_id: self.subject_id,
            exam_type: self.exam_type.clone(),
        }
    }
}

/// Insert payload for a triple that has no record yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMark {
    pub key: MarkKey,
    pub obtained_score: f64,
    pub max_score: f64,
}

/// One `(student, score)` pair inside a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkRow {
    pub student_id: StudentId,
    pub obtained_score: f64,
}

/// Marks for one subject/exam, applied as a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkBatch {
    pub subject_id: SubjectId,
    pub exam_type: String,
    pub max_score: f64,
    /// Applied in this order.
    pub rows: Vec<MarkRow>,
}

impl MarkBatch {
    /// Builds a batch, trimming the exam label.
    pub fn new(
        subject_id: SubjectId,
        exam_type: impl Into<String>,
        max_score: f64,
        rows: Vec<MarkRow>,
    ) -> Self {
        Self {
            subject_id,
            exam_type: exam_type.into().trim().to_string(),
            max_score,
            rows,
        }
    }

    /// Storage key for one row of this batch.
    pub fn key_for(&self, row: &MarkRow) -> MarkKey {
        MarkKey {
            student_id: row.student_id,
            subject_id: self.subject_id,
            exam_type: self.exam_type.clone(),
        }
    }

    /// Checks batch preconditions. Performs no I/O.
    ///
    /// # Errors
    /// - Returns the first violated precondition, in field order, then rows
    ///   in submission order.
    pub fn validate(&self) -> Result<(), BatchValidationError> {
        if self.subject_id <= 0 {
            return Err(BatchValidationError::MissingSubject);
        }
        if self.exam_type.trim().is_empty() {
            return Err(BatchValidationError::MissingExamType);
        }
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(BatchValidationError::MissingMaxScore);
        }
        if self.rows.is_empty() {
            return Err(BatchValidationError::EmptyRows);
        }

        for (index, row) in self.rows.iter().enumerate() {
            if row.student_id <= 0 {
                return Err(BatchValidationError::MissingStudent { row: index });
            }
            if !row.obtained_score.is_finite() || row.obtained_score < 0.0 {
                return Err(BatchValidationError::InvalidScore { row: index });
            }
        }

        Ok(())
    }
}

/// Precondition violations detected before any storage access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchValidationError {
    MissingSubject,
    MissingExamType,
    MissingMaxScore,
    EmptyRows,
    /// Row at this zero-based position has no usable student id.
    MissingStudent { row: usize },
    /// Row at this zero-based position has a missing, negative or non-finite score.
    InvalidScore { row: usize },
}

impl Display for BatchValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSubject => write!(f, "subject_id is required"),
            Self::MissingExamType => write!(f, "exam_type is required"),
            Self::MissingMaxScore => write!(f, "max_marks must be a positive number"),
            Self::EmptyRows => write!(f, "records must contain at least one row"),
            Self::MissingStudent { row } => write!(f, "records[{row}].student_id is required"),
            Self::InvalidScore { row } => {
                write!(f, "records[{row}].marks_obtained must be a non-negative number")
            }
        }
    }
}

impl Error for BatchValidationError {}

#[cfg(test)]
mod tests {
    use super::{BatchValidationError, MarkBatch, MarkRow};

    fn row(student_id: i64, obtained_score: f64) -> MarkRow {
        MarkRow {
            student_id,
            obtained_score,
        }
    }

    #[test]
    fn new_trims_exam_label() {
        let batch = MarkBatch::new(1, "  midterm ", 100.0, vec![row(1, 80.0)]);
        assert_eq!(batch.exam_type, "midterm");
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_exam_and_zero_max_score() {
        let blank = MarkBatch::new(1, "   ", 100.0, vec![row(1, 80.0)]);
        assert_eq!(blank.validate(), Err(BatchValidationError::MissingExamType));

        let zero_max = MarkBatch::new(1, "final", 0.0, vec![row(1, 80.0)]);
        assert_eq!(zero_max.validate(), Err(BatchValidationError::MissingMaxScore));

        let nan_max = MarkBatch::new(1, "final", f64::NAN, vec![row(1, 80.0)]);
        assert_eq!(nan_max.validate(), Err(BatchValidationError::MissingMaxScore));
    }

    #[test]
    fn validate_reports_first_bad_row_position() {
        let batch = MarkBatch::new(
            1,
            "final",
            50.0,
            vec![row(1, 10.0), row(2, -1.0), row(0, 5.0)],
        );
        assert_eq!(
            batch.validate(),
            Err(BatchValidationError::InvalidScore { row: 1 })
        );
    }

    #[test]
    fn validate_allows_score_above_max() {
        let batch = MarkBatch::new(1, "final", 50.0, vec![row(1, 75.0)]);
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_rows() {
        let batch = MarkBatch::new(3, "final", 50.0, Vec::new());
        assert_eq!(batch.validate(), Err(BatchValidationError::EmptyRows));
    }
}
