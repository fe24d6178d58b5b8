//! Roster identities referenced by mark records.

use serde::{Deserialize, Serialize};

/// Stable identifier of a student row.
pub type StudentId = i64;

/// Stable identifier of a subject row.
pub type SubjectId = i64;

/// Student identity with a unique roll number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub roll_number: String,
    pub name: String,
    pub email: Option<String>,
}

/// Subject identity with a unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}
