//! Repository layer: persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define storage contracts for mark records and roster lookups.
//! - Keep SQL inside the persistence boundary.
//!
//! # Invariants
//! - Repositories never open transactions; callers own the unit of work.
//! - Constraint rejections surface as `RepoError::ConstraintViolation`, never
//!   as a generic DB error.

pub mod mark_repo;
pub mod roster_repo;
