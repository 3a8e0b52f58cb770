//! Externally-owned problem records.
//!
//! The pipeline persists stage outputs into records it does not own: it
//! writes partial updates at stage boundaries and never reads its own
//! writes back within a run. [`RecordStore`] is the seam the caller
//! implements against its real database; [`MemoryRecordStore`] is the
//! in-process implementation used by tests.
//!
//! Store failures are fatal ([`crate::error::PipelineError::RecordStore`]):
//! losing persistence is an infrastructure problem no fail-soft contract
//! covers.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PipelineError;

/// Field names of a problem record, shared by every [`RecordStore`] writer
/// and reader.
pub mod fields {
    pub const STATUS: &str = "status";
    pub const OCR_RESULT: &str = "ocr_result";
    pub const PARSED_PROBLEM: &str = "parsed_problem";
    pub const SOLUTION: &str = "solution";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Store of problem records, keyed by problem id.
///
/// `update` merges the given partial object's top-level keys into the
/// record, leaving other keys untouched.
pub trait RecordStore: Send + Sync {
    /// Create a record with the given initial fields, returning its id.
    fn create(&self, initial: Value) -> BoxFuture<'_, Result<String, PipelineError>>;

    /// Read a full record. `Ok(None)` when the id is unknown.
    fn get<'a>(&'a self, problem_id: &'a str)
        -> BoxFuture<'a, Result<Option<Value>, PipelineError>>;

    /// Merge a partial update into an existing record.
    fn update<'a>(
        &'a self,
        problem_id: &'a str,
        partial: Value,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// In-memory [`RecordStore`] with sequential `problem-N` ids.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Value>,
    next_id: u64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, initial: Value) -> BoxFuture<'_, Result<String, PipelineError>> {
        Box::pin(async move {
            if !initial.is_object() {
                return Err(PipelineError::RecordStore {
                    problem_id: "<new>".to_string(),
                    detail: "initial record must be a JSON object".to_string(),
                });
            }
            let mut inner = self.inner.lock().await;
            inner.next_id += 1;
            let id = format!("problem-{}", inner.next_id);
            inner.records.insert(id.clone(), initial);
            debug!(problem_id = %id, "record created");
            Ok(id)
        })
    }

    fn get<'a>(
        &'a self,
        problem_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, PipelineError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner.records.get(problem_id).cloned())
        })
    }

    fn update<'a>(
        &'a self,
        problem_id: &'a str,
        partial: Value,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let Value::Object(partial) = partial else {
                return Err(PipelineError::RecordStore {
                    problem_id: problem_id.to_string(),
                    detail: "partial update must be a JSON object".to_string(),
                });
            };
            let mut inner = self.inner.lock().await;
            let record = inner.records.get_mut(problem_id).ok_or_else(|| {
                PipelineError::RecordStore {
                    problem_id: problem_id.to_string(),
                    detail: "no such record".to_string(),
                }
            })?;
            let Value::Object(existing) = record else {
                return Err(PipelineError::RecordStore {
                    problem_id: problem_id.to_string(),
                    detail: "stored record is not a JSON object".to_string(),
                });
            };
            for (key, value) in partial {
                existing.insert(key, value);
            }
            debug!(problem_id, "record updated");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryRecordStore::new();
        let a = store.create(json!({"status": "queued"})).await.unwrap();
        let b = store.create(json!({"status": "queued"})).await.unwrap();
        assert_eq!(a, "problem-1");
        assert_eq!(b, "problem-2");
    }

    #[tokio::test]
    async fn update_merges_top_level_keys() {
        let store = MemoryRecordStore::new();
        let id = store
            .create(json!({"status": "queued", "created_at": "t0"}))
            .await
            .unwrap();
        store
            .update(&id, json!({"status": "processing", "updated_at": "t1"}))
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record["status"], "processing");
        assert_eq!(record["created_at"], "t0");
        assert_eq!(record["updated_at"], "t1");
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_an_error() {
        let store = MemoryRecordStore::new();
        let err = store
            .update("problem-404", json!({"status": "processing"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RecordStore { .. }));
    }

    #[tokio::test]
    async fn get_of_unknown_record_is_none() {
        let store = MemoryRecordStore::new();
        assert!(store.get("problem-404").await.unwrap().is_none());
    }
}
