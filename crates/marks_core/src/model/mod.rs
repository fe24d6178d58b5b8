//! Domain model for exam-mark reconciliation.
//!
//! # Responsibility
//! - Define the stored mark record and the transient batch that updates it.
//! - Define the roster identities that mark records reference.
//!
//! # Invariants
//! - A mark record is addressed by its `(student, subject, exam_type)` triple.
//! - Roster entities are owned outside the marks core.

pub mod mark;
pub mod roster;
