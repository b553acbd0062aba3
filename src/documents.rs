//! Document store client contract.
//!
//! The store is filter-based with `$set`/`$setOnInsert` upsert semantics:
//! `set` fields are written on every call, `set_on_insert` fields only when
//! the filter matched nothing and a new document was created. Both calls
//! answer with the uniform ok/error envelope, surfaced here as a `Result`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Collection holding materialized course occurrences.
pub const COURSES: &str = "courses";

#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Upserts the first document matching `filter`: applies `set` always,
    /// `set_on_insert` only when inserting.
    async fn upsert(
        &self,
        collection: &str,
        filter: Value,
        set: Value,
        set_on_insert: Value,
    ) -> Result<(), StoreError>;

    /// Applies `set` to every document matching `filter`. Returns the number
    /// of documents touched.
    async fn update_many(
        &self,
        collection: &str,
        filter: Value,
        set: Value,
    ) -> Result<u64, StoreError>;
}
