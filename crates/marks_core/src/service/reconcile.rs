//! Mark batch reconciliation engine.
//!
//! # Responsibility
//! - Merge a `MarkBatch` into the record store: update the record of every
//!   triple that has one, insert a record for every triple that has none.
//! - Apply the whole batch inside one `BEGIN IMMEDIATE` transaction.
//!
//! # Invariants
//! - Preconditions are checked before any storage access.
//! - Any row failure rolls back every row of the batch.
//! - Updates always overwrite `max_score` with the batch value (last writer
//!   wins per triple).
//! - Re-applying an identical batch leaves stored state unchanged.

use crate::model::mark::{BatchValidationError, MarkBatch, NewMark};
use crate::repo::mark_repo::{MarkRepository, RepoError, SqliteMarkRepository};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Failure of a whole batch. Nothing from the batch is persisted.
#[derive(Debug)]
pub enum ReconcileError {
    /// Batch preconditions failed; storage was not touched.
    InvalidRequest(BatchValidationError),
    /// Storage rejected the batch.
    Storage {
        /// Zero-based position of the failing row; `None` when opening or
        /// committing the transaction failed.
        row: Option<usize>,
        source: RepoError,
    },
}

impl ReconcileError {
    fn storage(source: RepoError) -> Self {
        Self::Storage { row: None, source }
    }
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(err) => write!(f, "invalid mark batch: {err}"),
            Self::Storage {
                row: Some(row),
                source,
            } => write!(f, "mark batch failed at row {row}: {source}"),
            Self::Storage { row: None, source } => write!(f, "mark batch failed: {source}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRequest(err) => Some(err),
            Self::Storage { source, .. } => Some(source),
        }
    }
}

impl From<BatchValidationError> for ReconcileError {
    fn from(value: BatchValidationError) -> Self {
        Self::InvalidRequest(value)
    }
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Correlates the batch's log lines.
    pub batch_id: Uuid,
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Applies mark batches to a SQLite record store.
pub struct ReconciliationEngine<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ReconciliationEngine<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Applies `batch` as one unit of work.
    ///
    /// # Errors
    /// - `ReconcileError::InvalidRequest` when preconditions fail; no
    ///   transaction is opened.
    /// - `ReconcileError::Storage` when any row, or the commit, fails; the
    ///   transaction is rolled back.
    pub fn apply(&self, batch: &MarkBatch) -> ReconcileResult<ReconcileSummary> {
        let batch_id = Uuid::new_v4();
        if let Err(err) = batch.validate() {
            warn!(
                "event=marks_reconcile module=service status=rejected batch_id={batch_id} reason={err}"
            );
            return Err(err.into());
        }

        let started_at = Instant::now();
        info!(
            "event=marks_reconcile module=service status=start batch_id={batch_id} subject_id={} rows={}",
            batch.subject_id,
            batch.rows.len()
        );

        let outcome = self.apply_in_transaction(batch_id, batch);
        match &outcome {
            Ok(summary) => info!(
                "event=marks_reconcile module=service status=ok batch_id={batch_id} inserted={} updated={} duration_ms={}",
                summary.inserted,
                summary.updated,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=marks_reconcile module=service status=error batch_id={batch_id} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        outcome
    }

    fn apply_in_transaction(
        &self,
        batch_id: Uuid,
        batch: &MarkBatch,
    ) -> ReconcileResult<ReconcileSummary> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| ReconcileError::storage(err.into()))?;

        // Dropping `tx` on the error path rolls the batch back.
        let summary = reconcile_rows(&SqliteMarkRepository::new(&tx), batch_id, batch)?;

        tx.commit()
            .map_err(|err| ReconcileError::storage(err.into()))?;
        Ok(summary)
    }
}

/// Runs the upsert loop against `repo` in submission order.
///
/// Performs no transaction handling; the caller owns atomicity.
pub fn reconcile_rows<R: MarkRepository + ?Sized>(
    repo: &R,
    batch_id: Uuid,
    batch: &MarkBatch,
) -> ReconcileResult<ReconcileSummary> {
    let mut summary = ReconcileSummary {
        batch_id,
        processed: 0,
        inserted: 0,
        updated: 0,
    };

    for (index, row) in batch.rows.iter().enumerate() {
        let key = batch.key_for(row);
        let at_row = |source: RepoError| ReconcileError::Storage {
            row: Some(index),
            source,
        };

        match repo.find_by_triple(&key).map_err(at_row)? {
            Some(existing) => {
                repo.update(existing.id, row.obtained_score, batch.max_score)
                    .map_err(at_row)?;
                summary.updated += 1;
            }
            None => {
                let mark = NewMark {
                    key,
                    obtained_score: row.obtained_score,
                    max_score: batch.max_score,
                };
                repo.insert(&mark).map_err(at_row)?;
                summary.inserted += 1;
            }
        }
        summary.processed += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{reconcile_rows, ReconcileError};
    use crate::model::mark::{MarkBatch, MarkId, MarkKey, MarkRecord, MarkRow, NewMark};
    use crate::model::roster::SubjectId;
    use crate::repo::mark_repo::{MarkRepository, MarkView, RepoError, RepoResult};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    /// In-memory store that records the order of calls it receives.
    #[derive(Default)]
    struct MemoryStore {
        records: RefCell<BTreeMap<MarkKey, MarkRecord>>,
        calls: RefCell<Vec<String>>,
        fail_update_for: Option<MarkId>,
    }

    impl MarkRepository for MemoryStore {
        fn find_by_triple(&self, key: &MarkKey) -> RepoResult<Option<MarkRecord>> {
            self.calls
                .borrow_mut()
                .push(format!("find:{}", key.student_id));
            Ok(self.records.borrow().get(key).cloned())
        }

        fn insert(&self, mark: &NewMark) -> RepoResult<MarkId> {
            self.calls
                .borrow_mut()
                .push(format!("insert:{}", mark.key.student_id));
            let mut records = self.records.borrow_mut();
            let id = records.len() as MarkId + 1;
            records.insert(
                mark.key.clone(),
                MarkRecord {
                    id,
                    student_id: mark.key.student_id,
                    subject_id: mark.key.subject_id,
                    exam_type: mark.key.exam_type.clone(),
                    obtained_score: mark.obtained_score,
                    max_score: mark.max_score,
                },
            );
            Ok(id)
        }

        fn update(&self, id: MarkId, obtained_score: f64, max_score: f64) -> RepoResult<()> {
            self.calls.borrow_mut().push(format!("update:{id}"));
            if self.fail_update_for == Some(id) {
                return Err(RepoError::NotFound(id));
            }
            let mut records = self.records.borrow_mut();
            let record = records
                .values_mut()
                .find(|record| record.id == id)
                .ok_or(RepoError::NotFound(id))?;
            record.obtained_score = obtained_score;
            record.max_score = max_score;
            Ok(())
        }

        fn list_by_exam(&self, _: SubjectId, _: &str) -> RepoResult<Vec<MarkView>> {
            Ok(Vec::new())
        }
    }

    fn batch(rows: &[(i64, f64)]) -> MarkBatch {
        MarkBatch::new(
            7,
            "midterm",
            100.0,
            rows.iter()
                .map(|&(student_id, obtained_score)| MarkRow {
                    student_id,
                    obtained_score,
                })
                .collect(),
        )
    }

    #[test]
    fn rows_are_looked_up_before_each_write_in_submission_order() {
        let store = MemoryStore::default();
        let summary = reconcile_rows(&store, Uuid::new_v4(), &batch(&[(3, 1.0), (1, 2.0)]))
            .expect("batch should apply");

        assert_eq!(summary.inserted, 2);
        assert_eq!(
            store.calls.borrow().as_slice(),
            ["find:3", "insert:3", "find:1", "insert:1"]
        );
    }

    #[test]
    fn repeated_student_in_one_batch_updates_its_own_insert() {
        let store = MemoryStore::default();
        let summary = reconcile_rows(&store, Uuid::new_v4(), &batch(&[(4, 10.0), (4, 20.0)]))
            .expect("batch should apply");

        assert_eq!((summary.inserted, summary.updated), (1, 1));
        let records = store.records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records.values().next().map(|r| r.obtained_score), Some(20.0));
    }

    #[test]
    fn failing_row_is_attributed_by_position() {
        let store = MemoryStore {
            fail_update_for: Some(1),
            ..MemoryStore::default()
        };
        reconcile_rows(&store, Uuid::new_v4(), &batch(&[(5, 1.0)])).unwrap();

        let err = reconcile_rows(&store, Uuid::new_v4(), &batch(&[(6, 1.0), (5, 2.0)]))
            .expect_err("update of record 1 should fail");
        assert!(matches!(
            err,
            ReconcileError::Storage {
                row: Some(1),
                source: RepoError::NotFound(1)
            }
        ));
    }
}
