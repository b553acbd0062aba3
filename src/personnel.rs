//! Two-phase personnel resolution.
//!
//! Phase 1 (discovery, read-only) runs while the export is parsed: every
//! referenced teacher or support-staff member either hits an already-known
//! mapping or is queued as a name+profile match query and remembered as an
//! unresolved candidate. Phase 2 commits the match batch, folds the results
//! back, creates whatever is still unmatched as new personnel nodes linked
//! to the unit, and folds those results back too. Course materialization
//! has a hard precondition on this phase leaving nothing unresolved.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::checksum::checksum;
use crate::context::{ImportContext, RefCategory};
use crate::dialect::DialectSpec;
use crate::error::{ImportError, Result};
use crate::graph::{self, GraphBatch, GraphClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Teacher,
    Staff,
}

impl Profile {
    pub fn label(&self) -> &'static str {
        match self {
            Profile::Teacher => "Teacher",
            Profile::Staff => "Staff",
        }
    }

    pub fn external_id(&self) -> &'static str {
        match self {
            Profile::Teacher => "PROFILE_TEACHER",
            Profile::Staff => "PROFILE_STAFF",
        }
    }

    pub fn category(&self) -> RefCategory {
        match self {
            Profile::Teacher => RefCategory::Teacher,
            Profile::Staff => RefCategory::Staff,
        }
    }

    fn from_label(label: &str) -> Option<Profile> {
        match label {
            "Teacher" => Some(Profile::Teacher),
            "Staff" => Some(Profile::Staff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    local_id: String,
    profile: Profile,
    record: Value,
}

#[derive(Default)]
pub struct PersonnelResolver {
    /// external id -> resolved graph id, seeded from the bootstrap query.
    mappings: HashMap<String, String>,
    /// external id -> candidate awaiting a match or creation.
    pending: HashMap<String, Candidate>,
    match_batch: GraphBatch,
}

impl PersonnelResolver {
    pub fn new() -> Self {
        PersonnelResolver::default()
    }

    pub fn seed_mapping(&mut self, external_id: &str, graph_id: &str) {
        self.mappings
            .insert(external_id.to_string(), graph_id.to_string());
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Phase 1: register one referenced teacher/staff entity.
    ///
    /// Missing mandatory name fields are a validation error: the record is
    /// ignored with a reason and the run continues.
    pub fn discover(
        &mut self,
        ctx: &mut ImportContext,
        dialect: &DialectSpec,
        profile: Profile,
        entity: &Value,
    ) {
        let Some(local_id) = entity.get("id").and_then(Value::as_str).map(str::to_string) else {
            ctx.report
                .add_ignored(profile.label(), "missing id", entity.clone());
            return;
        };
        let Some(record) = profile_record(entity) else {
            ctx.report.add_ignored(
                profile.label(),
                "missing firstName or lastName",
                entity.clone(),
            );
            return;
        };

        let natural = dialect
            .teacher_id_attribute
            .and_then(|attr| entity.get(attr))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty());
        // Registry-wide ids live in the graph's own external-id space and
        // must stay raw, or the bootstrap mapping could never hit. Unit-local
        // ids and the checksum fallback get the unit prefix.
        let external_id = match natural {
            Some(v) if !dialect.scoped_personnel_ids => v.to_string(),
            Some(v) => ctx.scoped_external_id(v),
            None => ctx.scoped_external_id(&checksum(&record)),
        };

        if let Some(graph_id) = self.mappings.get(&external_id) {
            ctx.insert(profile.category(), &local_id, graph_id);
            return;
        }
        if self.pending.contains_key(&external_id) {
            return;
        }

        tracing::debug!(%external_id, profile = profile.label(), "queueing personnel match");
        self.match_batch.add(
            graph::MATCH_PERSONNEL,
            json!({
                "code": ctx.unit_code,
                "profile": profile.label(),
                "lastName": record["lastName"].as_str().unwrap_or_default().to_lowercase(),
                "firstName": record["firstName"].as_str().unwrap_or_default().to_lowercase(),
                "externalId": external_id,
            }),
        );
        self.pending.insert(
            external_id,
            Candidate {
                local_id,
                profile,
                record,
            },
        );
    }

    /// Phase 2: commit the match queries, create the leftovers, fold all
    /// results into the reference mapping.
    pub async fn commit(
        &mut self,
        ctx: &mut ImportContext,
        graph_client: &Arc<dyn GraphClient>,
    ) -> Result<()> {
        if self.match_batch.is_empty() && self.pending.is_empty() {
            return Ok(());
        }

        tracing::info!(
            queries = self.match_batch.len(),
            "committing personnel match batch"
        );
        let results = graph_client
            .commit(self.match_batch.take())
            .await
            .map_err(|e| ImportError::Graph(e.message))?;
        self.fold_results(ctx, &results);

        if self.pending.is_empty() {
            return Ok(());
        }

        let mut create_batch = GraphBatch::new();
        for (external_id, candidate) in &self.pending {
            let id = Uuid::new_v4().to_string();
            let record = &candidate.record;
            let display_name = format!(
                "{} {}",
                record["firstName"].as_str().unwrap_or_default(),
                record["lastName"].as_str().unwrap_or_default()
            );
            create_batch.add(
                graph::CREATE_PERSONNEL,
                json!({
                    "externalId": external_id,
                    "id": id,
                    "displayName": display_name,
                    "checksum": checksum(record),
                    "firstName": record["firstName"],
                    "lastName": record["lastName"],
                    "birthDate": record.get("birthDate").cloned().unwrap_or(Value::Null),
                    "profiles": [candidate.profile.label()],
                    "source": ctx.source,
                }),
            );
            create_batch.add(
                graph::LINK_PERSONNEL_TO_UNIT,
                json!({
                    "unitExternalId": ctx.unit_external_id,
                    "profileExternalId": candidate.profile.external_id(),
                    "externalId": external_id,
                }),
            );
        }

        tracing::info!(
            candidates = self.pending.len(),
            "creating unmatched personnel"
        );
        let results = graph_client
            .commit(create_batch.take())
            .await
            .map_err(|e| ImportError::Graph(e.message))?;
        self.fold_results(ctx, &results);

        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ImportError::UnresolvedPersonnel(self.pending.len()))
        }
    }

    fn fold_results(&mut self, ctx: &mut ImportContext, results: &[Vec<Value>]) {
        for rows in results {
            for row in rows {
                let Some(external_id) = row.get("externalId").and_then(Value::as_str) else {
                    continue;
                };
                let Some(id) = row.get("id").and_then(Value::as_str) else {
                    continue;
                };
                let profile = row
                    .get("profile")
                    .and_then(Value::as_str)
                    .and_then(Profile::from_label);
                let Some(profile) = profile else { continue };
                if let Some(candidate) = self.pending.remove(external_id) {
                    debug_assert_eq!(candidate.profile, profile);
                    ctx.insert(profile.category(), &candidate.local_id, id);
                }
                self.mappings.insert(external_id.to_string(), id.to_string());
            }
        }
    }
}

/// Extracts the identifying profile fields from a canonicalized entity.
/// First and last name are mandatory; birth date rides along when present.
fn profile_record(entity: &Value) -> Option<Value> {
    let first = entity.get("firstName")?.as_str().filter(|s| !s.is_empty())?;
    let last = entity.get("lastName")?.as_str().filter(|s| !s.is_empty())?;
    let mut record = Map::new();
    record.insert("firstName".to_string(), Value::String(first.to_string()));
    record.insert("lastName".to_string(), Value::String(last.to_string()));
    if let Some(birth) = entity.get("birthDate").and_then(Value::as_str) {
        record.insert("birthDate".to_string(), Value::String(birth.to_string()));
    }
    Some(Value::Object(record))
}
