//! In-memory store fakes shared by the integration tests.
//!
//! The graph fake answers each statement by template, echoing creations the
//! way the real store's RETURN clauses do, and records every committed
//! statement for assertions. The document fake keeps a real map of courses
//! and evaluates the small filter language the import actually uses.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use timetable_feeder::graph::{self, GraphStatement};
use timetable_feeder::{DocumentClient, GraphClient, StoreError};

#[derive(Default)]
pub struct FakeGraph {
    /// Row returned for the unit-by-code lookup; None simulates no match.
    pub unit: Mutex<Option<Value>>,
    /// matchValue -> user id rows for the bootstrap personnel mapping.
    pub known_personnel: Mutex<Vec<(String, String)>>,
    /// externalId param -> (id, profile) answered by the name-match query.
    pub name_matches: Mutex<HashMap<String, (String, String)>>,
    /// Subject code -> id rows for the bootstrap subject mapping.
    pub subject_rows: Mutex<Vec<(String, String)>>,
    /// vendor class name -> operator name, returned as the mapping node.
    pub class_overrides: Mutex<HashMap<String, String>>,
    /// When set, personnel creation returns no rows (constraint violation).
    pub swallow_creations: Mutex<bool>,
    /// When set, every commit reports a non-ok envelope.
    pub fail_commits: Mutex<bool>,
    pub committed: Mutex<Vec<GraphStatement>>,
}

impl FakeGraph {
    pub fn with_unit(external_id: &str, id: &str, timetable: &str) -> Self {
        let fake = FakeGraph::default();
        *fake.unit.lock().unwrap() = Some(json!({
            "externalId": external_id,
            "id": id,
            "timetable": timetable,
        }));
        fake
    }

    pub fn committed_with_text(&self, text: &str) -> Vec<GraphStatement> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.text == text)
            .cloned()
            .collect()
    }

    fn answer(&self, statement: &GraphStatement) -> Vec<Value> {
        let text = statement.text.as_str();
        if text == graph::UNIT_BY_CODE {
            return self.unit.lock().unwrap().iter().cloned().collect();
        }
        if text == graph::TEACHERS_BY_PROFILE {
            return self
                .known_personnel
                .lock()
                .unwrap()
                .iter()
                .map(|(value, id)| json!({"id": id, "matchValue": value, "profile": "Teacher"}))
                .collect();
        }
        if text == graph::CLASS_NAME_OVERRIDES {
            let overrides = self.class_overrides.lock().unwrap();
            if overrides.is_empty() {
                return Vec::new();
            }
            let mapping: serde_json::Map<String, Value> = overrides
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            return vec![json!({"cm": {"mapping": mapping}})];
        }
        if text == graph::SUBJECT_MAPPINGS {
            return self
                .subject_rows
                .lock()
                .unwrap()
                .iter()
                .map(|(code, id)| json!({"code": code, "id": id}))
                .collect();
        }
        if text == graph::MATCH_PERSONNEL {
            let external_id = statement.params["externalId"].as_str().unwrap_or_default();
            if let Some((id, profile)) = self.name_matches.lock().unwrap().get(external_id) {
                return vec![json!({"id": id, "externalId": external_id, "profile": profile})];
            }
            return Vec::new();
        }
        if text == graph::CREATE_PERSONNEL {
            if *self.swallow_creations.lock().unwrap() {
                return Vec::new();
            }
            return vec![json!({
                "id": statement.params["id"],
                "externalId": statement.params["externalId"],
                "profile": statement.params["profiles"][0],
            })];
        }
        // Link and merge statements return no rows.
        Vec::new()
    }
}

#[async_trait]
impl GraphClient for FakeGraph {
    async fn query(&self, statement: &str, params: Value) -> Result<Vec<Value>, StoreError> {
        Ok(self.answer(&GraphStatement {
            text: statement.to_string(),
            params,
        }))
    }

    async fn commit(
        &self,
        statements: Vec<GraphStatement>,
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        if *self.fail_commits.lock().unwrap() {
            return Err(StoreError::new("graph unavailable"));
        }
        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            results.push(self.answer(&statement));
            self.committed.lock().unwrap().push(statement);
        }
        Ok(results)
    }
}

#[derive(Default)]
pub struct FakeDocuments {
    /// Documents by collection, keyed by their `_id`.
    pub collections: Mutex<HashMap<String, HashMap<String, Value>>>,
    pub upsert_calls: AtomicUsize,
    pub fail_upserts: Mutex<bool>,
}

fn matches(doc: &Value, filter: &Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return false;
    };
    conditions.iter().all(|(field, condition)| {
        let actual = doc.get(field);
        if let Some(operators) = condition.as_object() {
            if operators.keys().any(|k| k.starts_with('$')) {
                return operators.iter().all(|(op, expected)| match op.as_str() {
                    "$exists" => actual.is_some() == expected.as_bool().unwrap_or(true),
                    "$ne" => actual != Some(expected),
                    _ => panic!("unsupported filter operator {op}"),
                });
            }
        }
        actual == Some(condition)
    })
}

impl FakeDocuments {
    pub fn docs(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn insert(&self, collection: &str, doc: Value) {
        let id = doc["_id"].as_str().expect("doc id").to_string();
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc);
    }
}

#[async_trait]
impl DocumentClient for FakeDocuments {
    async fn upsert(
        &self,
        collection: &str,
        filter: Value,
        set: Value,
        set_on_insert: Value,
    ) -> Result<(), StoreError> {
        if *self.fail_upserts.lock().unwrap() {
            return Err(StoreError::new("document store unavailable"));
        }
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        let docs = collections.entry(collection.to_string()).or_default();
        let existing = docs.values_mut().find(|d| matches(d, &filter));
        match existing {
            Some(doc) => {
                let target = doc.as_object_mut().expect("stored doc is an object");
                for (k, v) in set.as_object().expect("set is an object") {
                    target.insert(k.clone(), v.clone());
                }
            }
            None => {
                let mut doc = set.as_object().cloned().expect("set is an object");
                for (k, v) in set_on_insert.as_object().expect("setOnInsert is an object") {
                    doc.insert(k.clone(), v.clone());
                }
                let id = doc["_id"].as_str().expect("doc id").to_string();
                docs.insert(id, Value::Object(doc));
            }
        }
        Ok(())
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Value,
        set: Value,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections.entry(collection.to_string()).or_default();
        let mut touched = 0;
        for doc in docs.values_mut() {
            if matches(doc, &filter) {
                let target = doc.as_object_mut().expect("stored doc is an object");
                for (k, v) in set.as_object().expect("set is an object") {
                    target.insert(k.clone(), v.clone());
                }
                touched += 1;
            }
        }
        Ok(touched)
    }
}
