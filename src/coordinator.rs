//! Transaction batch coordination.
//!
//! Course upserts are dispatched concurrently as they are materialized; the
//! outstanding counter tracks how many are still in flight. The
//! reconciliation sweep defines "stale" as "not touched by this run", so it
//! must observe every upsert of the run: `finish` awaits the counter down to
//! zero before sweeping, and any failed upsert aborts the run with no sweep
//! at all rather than marking half a timetable deleted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinSet;

use crate::documents::{DocumentClient, COURSES};
use crate::error::{ImportError, Result, StoreError};
use crate::graph::{GraphBatch, GraphClient};

pub struct Coordinator {
    graph: Arc<dyn GraphClient>,
    documents: Arc<dyn DocumentClient>,
    unit_id: String,
    timestamp: i64,
    outstanding: Arc<AtomicUsize>,
    writes: JoinSet<std::result::Result<(), StoreError>>,
}

impl Coordinator {
    pub fn new(
        graph: Arc<dyn GraphClient>,
        documents: Arc<dyn DocumentClient>,
        unit_id: &str,
        timestamp: i64,
    ) -> Self {
        Coordinator {
            graph,
            documents,
            unit_id: unit_id.to_string(),
            timestamp,
            outstanding: Arc::new(AtomicUsize::new(0)),
            writes: JoinSet::new(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Dispatches one course upsert keyed by its checksum id. The `created`
    /// timestamp is only written on first insert; `modified` rides in the
    /// document itself and is rewritten every run.
    pub fn queue_course(&mut self, doc: Value) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let documents = Arc::clone(&self.documents);
        let outstanding = Arc::clone(&self.outstanding);
        let created = self.timestamp;
        self.writes.spawn(async move {
            let filter = json!({"_id": doc["_id"]});
            let result = documents
                .upsert(COURSES, filter, doc, json!({"created": created}))
                .await;
            outstanding.fetch_sub(1, Ordering::SeqCst);
            result
        });
    }

    /// Commits the accumulated graph statements as one logical batch.
    /// A non-ok envelope is fatal for the run.
    pub async fn commit_graph(&self, mut batch: GraphBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        tracing::info!(statements = batch.len(), "committing graph batch");
        self.graph
            .commit(batch.take())
            .await
            .map_err(|e| ImportError::Graph(e.message))?;
        Ok(())
    }

    /// Awaits every in-flight upsert, then marks courses not touched by this
    /// run as deleted. Any upsert failure aborts before the sweep: a partial
    /// run must not redefine what "stale" means.
    pub async fn finish(&mut self) -> Result<u64> {
        let mut first_error: Option<StoreError> = None;
        while let Some(joined) = self.writes.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(StoreError::new(format!("upsert task failed: {e}")));
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(ImportError::Document(e.message));
        }
        debug_assert_eq!(self.outstanding(), 0);

        let swept = self
            .documents
            .update_many(
                COURSES,
                json!({
                    "unitId": self.unit_id,
                    "deleted": {"$exists": false},
                    "modified": {"$ne": self.timestamp},
                }),
                json!({"deleted": self.timestamp}),
            )
            .await
            .map_err(|e| ImportError::Document(e.message))?;
        tracing::info!(swept, unit_id = %self.unit_id, "reconciliation sweep done");
        Ok(swept)
    }
}
