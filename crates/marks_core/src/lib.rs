//! Core of the school-portal marks backend.
//!
//! Reconciles exam-mark batches into a SQLite record store so that every
//! `(student, subject, exam_type)` triple holds exactly one record and each
//! batch applies all-or-nothing.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, PortalConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::mark::{BatchValidationError, MarkBatch, MarkId, MarkKey, MarkRecord, MarkRow, NewMark};
pub use model::roster::{Student, StudentId, Subject, SubjectId};
pub use repo::mark_repo::{MarkRepository, MarkView, RepoError, RepoResult, SqliteMarkRepository};
pub use repo::roster_repo::{RosterRepository, SqliteRosterRepository};
pub use service::gateway::{
    GatewayError, GatewayResponse, GetMarksQuery, MarksGateway, SubmitMarkRow, SubmitMarksRequest,
};
pub use service::reconcile::{
    reconcile_rows, ReconcileError, ReconcileResult, ReconcileSummary, ReconciliationEngine,
};

/// Health-check probe.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
