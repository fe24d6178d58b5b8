//! Marks query gateway: the boundary between portal callers and the engine.
//!
//! # Responsibility
//! - Read path: list one subject/exam's marks joined with student identity.
//! - Write path: turn a loosely-typed submission into a `MarkBatch`, forward
//!   it to the reconciliation engine, and map failures to caller-facing
//!   messages.
//!
//! # Invariants
//! - A read with a missing subject or exam label returns an empty list.
//! - Validation failures never touch storage.
//! - Storage error details never reach the response body.
//! - Callers are assumed to be authorized admins; no auth happens here.

use crate::model::mark::{BatchValidationError, MarkBatch, MarkRow};
use crate::model::roster::{StudentId, SubjectId};
use crate::repo::mark_repo::{MarkRepository, MarkView, RepoResult, SqliteMarkRepository};
use crate::service::reconcile::{ReconcileError, ReconcileSummary, ReconciliationEngine};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const MSG_MARKS_RECORDED: &str = "Marks recorded";
pub const MSG_MISSING_FIELDS: &str = "Missing required fields";
pub const MSG_DATABASE_ERROR: &str = "Database error";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";

/// Read request. Ids may arrive as numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GetMarksQuery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub exam_type: Option<String>,
}

/// One submitted row as received on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitMarkRow {
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<StudentId>,
    #[serde(
        default,
        rename = "marks_obtained",
        deserialize_with = "lenient_number"
    )]
    pub obtained_score: Option<f64>,
}

/// Submission request as received on the wire.
///
/// Every field is optional so that absent or mistyped fields become
/// "missing required fields" instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitMarksRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub exam_type: Option<String>,
    #[serde(default, rename = "max_marks", deserialize_with = "lenient_number")]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub records: Option<Vec<SubmitMarkRow>>,
}

impl SubmitMarksRequest {
    /// Converts the wire request into a validated batch.
    pub fn into_batch(self) -> Result<MarkBatch, BatchValidationError> {
        let subject_id = self
            .subject_id
            .ok_or(BatchValidationError::MissingSubject)?;
        let exam_type = self
            .exam_type
            .ok_or(BatchValidationError::MissingExamType)?;
        let max_score = self.max_score.ok_or(BatchValidationError::MissingMaxScore)?;
        let records = self.records.ok_or(BatchValidationError::EmptyRows)?;

        let rows = records
            .into_iter()
            .enumerate()
            .map(|(row, record)| -> Result<MarkRow, BatchValidationError> {
                Ok(MarkRow {
                    student_id: record
                        .student_id
                        .ok_or(BatchValidationError::MissingStudent { row })?,
                    obtained_score: record
                        .obtained_score
                        .ok_or(BatchValidationError::InvalidScore { row })?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let batch = MarkBatch::new(subject_id, exam_type, max_score, rows);
        batch.validate()?;
        Ok(batch)
    }
}

/// Caller-facing failure of a submission.
#[derive(Debug)]
pub enum GatewayError {
    /// Request failed validation; nothing was written.
    MissingFields(BatchValidationError),
    /// Storage failed; the batch was rolled back.
    Database,
}

impl GatewayError {
    /// HTTP-style status code for the failure class.
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingFields(_) => 400,
            Self::Database => 500,
        }
    }

    /// Message safe to show the caller.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => MSG_MISSING_FIELDS,
            Self::Database => MSG_DATABASE_ERROR,
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingFields(err) => Some(err),
            Self::Database => None,
        }
    }
}

impl From<ReconcileError> for GatewayError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::InvalidRequest(err) => Self::MissingFields(err),
            ReconcileError::Storage { .. } => Self::Database,
        }
    }
}

/// Status plus JSON body, independent of any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
}

impl GatewayResponse {
    fn message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "message": message }),
        }
    }
}

/// Marks gateway bound to one connection.
pub struct MarksGateway<'conn> {
    conn: &'conn Connection,
}

impl<'conn> MarksGateway<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Lists marks for one subject/exam.
    ///
    /// Returns an empty list when `subject_id` or `exam_type` is absent.
    pub fn get_marks(&self, query: &GetMarksQuery) -> RepoResult<Vec<MarkView>> {
        let exam_type = query
            .exam_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let (Some(subject_id), Some(exam_type)) = (query.subject_id, exam_type) else {
            return Ok(Vec::new());
        };

        let started_at = Instant::now();
        let marks = SqliteMarkRepository::new(self.conn).list_by_exam(subject_id, exam_type)?;
        info!(
            "event=marks_query module=gateway status=ok subject_id={subject_id} rows={} duration_ms={}",
            marks.len(),
            started_at.elapsed().as_millis()
        );
        Ok(marks)
    }

    /// Validates and applies one submission.
    ///
    /// # Errors
    /// - `GatewayError::MissingFields` for any invalid or absent field.
    /// - `GatewayError::Database` for any storage failure; details are logged
    ///   only.
    pub fn submit_marks(
        &self,
        request: SubmitMarksRequest,
    ) -> Result<ReconcileSummary, GatewayError> {
        let batch = request.into_batch().map_err(|err| {
            warn!("event=marks_submit module=gateway status=rejected reason={err}");
            GatewayError::MissingFields(err)
        })?;

        ReconciliationEngine::new(self.conn)
            .apply(&batch)
            .map_err(GatewayError::from)
    }

    /// Dispatches a request by method: `GET` reads with `payload` as the
    /// query, `POST` submits with `payload` as the body.
    pub fn handle(&self, method: &str, payload: Value) -> GatewayResponse {
        match method.to_ascii_uppercase().as_str() {
            "GET" => self.handle_get(payload),
            "POST" => self.handle_post(payload),
            other => {
                warn!("event=marks_request module=gateway status=rejected method={other}");
                GatewayResponse::message(405, MSG_METHOD_NOT_ALLOWED)
            }
        }
    }

    fn handle_get(&self, payload: Value) -> GatewayResponse {
        let query = serde_json::from_value::<GetMarksQuery>(payload).unwrap_or_default();
        match self.get_marks(&query) {
            Ok(marks) => match serde_json::to_value(marks) {
                Ok(body) => GatewayResponse { status: 200, body },
                Err(err) => {
                    error!("event=marks_query module=gateway status=error error_code=encode_failed error={err}");
                    GatewayResponse::message(500, MSG_DATABASE_ERROR)
                }
            },
            Err(err) => {
                error!("event=marks_query module=gateway status=error error_code=query_failed error={err}");
                GatewayResponse::message(500, MSG_DATABASE_ERROR)
            }
        }
    }

    fn handle_post(&self, payload: Value) -> GatewayResponse {
        let request = match serde_json::from_value::<SubmitMarksRequest>(payload) {
            Ok(request) => request,
            Err(err) => {
                warn!("event=marks_submit module=gateway status=rejected reason=undecodable_body error={err}");
                return GatewayResponse::message(400, MSG_MISSING_FIELDS);
            }
        };

        match self.submit_marks(request) {
            Ok(summary) => GatewayResponse {
                status: 200,
                body: json!({
                    "message": MSG_MARKS_RECORDED,
                    "processed": summary.processed,
                }),
            },
            Err(err) => GatewayResponse::message(err.status(), err.message()),
        }
    }
}

/// Accepts an integer, a numeric string, or null. Anything else is treated
/// as absent so validation reports it.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts a number, a numeric string, or null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::{GetMarksQuery, SubmitMarksRequest};
    use crate::model::mark::BatchValidationError;
    use serde_json::json;

    #[test]
    fn submit_request_accepts_numeric_strings() {
        let request: SubmitMarksRequest = serde_json::from_value(json!({
            "subject_id": "2",
            "exam_type": "final",
            "max_marks": "50",
            "records": [{ "student_id": 4, "marks_obtained": "41.5" }]
        }))
        .unwrap();

        let batch = request.into_batch().unwrap();
        assert_eq!(batch.subject_id, 2);
        assert_eq!(batch.max_score, 50.0);
        assert_eq!(batch.rows[0].obtained_score, 41.5);
    }

    #[test]
    fn missing_max_marks_is_reported() {
        let request: SubmitMarksRequest = serde_json::from_value(json!({
            "subject_id": 1,
            "exam_type": "midterm",
            "records": [{ "student_id": 1, "marks_obtained": 80 }]
        }))
        .unwrap();

        assert_eq!(
            request.into_batch(),
            Err(BatchValidationError::MissingMaxScore)
        );
    }

    #[test]
    fn mistyped_row_field_is_reported_by_position() {
        let request: SubmitMarksRequest = serde_json::from_value(json!({
            "subject_id": 1,
            "exam_type": "midterm",
            "max_marks": 100,
            "records": [
                { "student_id": 1, "marks_obtained": 80 },
                { "student_id": [1], "marks_obtained": 70 }
            ]
        }))
        .unwrap();

        assert_eq!(
            request.into_batch(),
            Err(BatchValidationError::MissingStudent { row: 1 })
        );
    }

    #[test]
    fn query_decodes_string_subject_id() {
        let query: GetMarksQuery =
            serde_json::from_value(json!({ "subject_id": "3", "exam_type": "final" })).unwrap();
        assert_eq!(query.subject_id, Some(3));
    }
}
