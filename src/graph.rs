//! Graph store client contract and the statement templates the import
//! queues against it.
//!
//! The store executes parameterized statements. Batches are committed as one
//! logical unit and answer with per-statement row sets in submission order,
//! but the store gives no ordering guarantee *within* a batch, so every
//! statement here is self-contained merge/upsert logic that never depends on
//! a sibling statement's side effect.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct GraphStatement {
    pub text: String,
    pub params: Value,
}

/// Accumulates statements for one commit. Owned by a single run.
#[derive(Debug, Default)]
pub struct GraphBatch {
    statements: Vec<GraphStatement>,
}

impl GraphBatch {
    pub fn new() -> Self {
        GraphBatch::default()
    }

    pub fn add(&mut self, text: &str, params: Value) {
        self.statements.push(GraphStatement {
            text: text.to_string(),
            params,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn take(&mut self) -> Vec<GraphStatement> {
        std::mem::take(&mut self.statements)
    }
}

#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Executes one parameterized read, returning rows of named fields.
    async fn query(&self, statement: &str, params: Value) -> Result<Vec<Value>, StoreError>;

    /// Commits a batch of write statements as one logical unit, returning
    /// per-statement result rows in submission order.
    async fn commit(&self, statements: Vec<GraphStatement>)
        -> Result<Vec<Vec<Value>>, StoreError>;
}

// Bootstrap reads.

pub const UNIT_BY_CODE: &str = "MATCH (s:Unit {code: $code}) \
     RETURN s.externalId AS externalId, s.id AS id, s.timetable AS timetable";

pub const TEACHERS_BY_PROFILE: &str = "MATCH (:Unit {code: $code})<-[:DEPENDS]-(:ProfileGroup)<-[:IN]-(u:User) \
     WHERE head(u.profiles) = $profile AND NOT(u[$matchAttribute] IS NULL) \
     RETURN DISTINCT u.id AS id, u[$matchAttribute] AS matchValue, head(u.profiles) AS profile";

pub const CLASS_NAME_OVERRIDES: &str =
    "MATCH (:Unit {code: $code})<-[:MAPPING]-(cm:ClassesMapping) RETURN cm";

pub const SUBJECT_MAPPINGS: &str =
    "MATCH (:Unit {code: $code})<-[:SUBJECT]-(sub:Subject) \
     RETURN sub.code AS code, sub.id AS id";

// Personnel resolution.

pub const MATCH_PERSONNEL: &str = "MATCH (:Unit {code: $code})<-[:DEPENDS]-(:ProfileGroup)<-[:IN]-(u:User) \
     WHERE head(u.profiles) = $profile \
       AND LOWER(u.lastName) = $lastName AND LOWER(u.firstName) = $firstName \
     SET u.vendorId = $externalId \
     RETURN DISTINCT u.id AS id, u.vendorId AS externalId, head(u.profiles) AS profile";

/// Merge-by-external-id personnel creation. Fields are only rewritten when
/// the content checksum differs, so re-imports are cheap no-ops.
pub const CREATE_PERSONNEL: &str = "MERGE (u:User {externalId: $externalId}) \
     ON CREATE SET u.id = $id, u.displayName = $displayName \
     WITH u \
     WHERE u.checksum IS NULL OR u.checksum <> $checksum \
     SET u.checksum = $checksum, u.firstName = $firstName, u.lastName = $lastName, \
         u.birthDate = $birthDate, u.profiles = $profiles, u.source = $source, \
         u.vendorId = $externalId \
     RETURN u.id AS id, u.externalId AS externalId, head(u.profiles) AS profile";

pub const LINK_PERSONNEL_TO_UNIT: &str = "MATCH (s:Unit {externalId: $unitExternalId})<-[:DEPENDS]-(g:ProfileGroup)\
     -[:HAS_PROFILE]->(p:Profile {externalId: $profileExternalId}), \
     (u:User {externalId: $externalId}) \
     MERGE (u)-[:IN]->(g)";

// Structural bootstrap.

pub const CREATE_SUBJECT: &str = "MATCH (s:Unit {externalId: $unitExternalId}) \
     MERGE (sub:Subject {externalId: $externalId}) \
     ON CREATE SET sub.code = $code, sub.label = $label, sub.id = $id \
     MERGE (sub)-[:SUBJECT]->(s)";

pub const CREATE_GROUP: &str = "MATCH (s:Unit {externalId: $unitExternalId}) \
     MERGE (fg:FunctionalGroup {externalId: $externalId}) \
     ON CREATE SET fg.name = $name, fg.id = $id \
     MERGE (fg)-[:DEPENDS]->(s)";

/// Records a class name with no matching Class node on the unit's mapping
/// node so an operator can map it later. Non-fatal by design.
pub const REGISTER_UNKNOWN_CLASS: &str = "MATCH (s:Unit {code: $code})<-[:BELONGS]-(c:Class) \
     WHERE c.name = $className \
     WITH count(*) AS found, s \
     WHERE found = 0 \
     MERGE (cm:ClassesMapping {code: $code}) \
     SET cm.unknownClasses = coalesce(\
         [cn IN cm.unknownClasses WHERE cn <> $className], []) + $className \
     MERGE (s)<-[:MAPPING]-(cm)";

// Per-course structural links.

pub const LINK_TEACHER_TO_SUBJECT: &str = "MATCH (sub:Subject {id: $subjectId}), (u:User) \
     WHERE u.id IN $teacherIds \
     MERGE (u)-[r:TEACHES]->(sub) \
     SET r.classes = [c IN coalesce(r.classes, []) WHERE NOT c IN $classes] + $classes, \
         r.groups = [g IN coalesce(r.groups, []) WHERE NOT g IN $groups] + $groups";

pub const PERSONNEL_TO_GROUP: &str = "MATCH (u:User {id: $id}), (fg:FunctionalGroup) \
     WHERE fg.externalId IN $groups \
     MERGE (u)-[:IN {source: $source, outDate: $outDate}]->(fg)";

pub const STUDENT_TO_GROUP: &str = "MATCH (u:User {externalId: $studentExternalId}), \
     (fg:FunctionalGroup {externalId: $externalId}) \
     MERGE (u)-[:IN {source: $source, inDate: $inDate, outDate: $outDate}]->(fg)";
