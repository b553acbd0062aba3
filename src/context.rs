//! Per-run import state.
//!
//! Each run owns one `ImportContext`; nothing here is shared across runs, so
//! the reference tables need no locking. The tables map dialect-local ids to
//! resolved values: graph ids for subjects, teachers and staff, display
//! labels for rooms, equipment, classes and groups.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefCategory {
    Teacher,
    Staff,
    Room,
    Equipment,
    Subject,
    Class,
    Group,
}

impl RefCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RefCategory::Teacher => "teacher",
            RefCategory::Staff => "staff",
            RefCategory::Room => "room",
            RefCategory::Equipment => "equipment",
            RefCategory::Subject => "subject",
            RefCategory::Class => "class",
            RefCategory::Group => "group",
        }
    }
}

pub struct ImportContext {
    pub unit_code: String,
    pub unit_id: String,
    pub unit_external_id: String,
    pub source: String,
    /// Run timestamp, milliseconds since epoch. Doubles as the
    /// "still valid" marker the reconciliation sweep compares against.
    pub timestamp: i64,

    /// Start of ISO week 1, offset by the grid's slot-0 start-of-day time
    /// once the schedule grid has been seen.
    pub week1_anchor: Option<DateTime<Utc>>,
    pub slot_duration_minutes: Option<i64>,
    /// End of the school year for pupils; bounds membership windows.
    pub year_end: Option<DateTime<Utc>>,

    tables: HashMap<RefCategory, HashMap<String, String>>,
    /// Operator-maintained class-name overrides loaded at bootstrap.
    pub class_name_overrides: HashMap<String, String>,
    /// Subject code -> already existing subject graph id, from bootstrap.
    pub subject_codes: HashMap<String, String>,

    pub report: Report,
}

impl ImportContext {
    pub fn new(unit_code: &str, source: &str, timestamp: i64) -> Self {
        ImportContext {
            unit_code: unit_code.to_string(),
            unit_id: String::new(),
            unit_external_id: String::new(),
            source: source.to_string(),
            timestamp,
            week1_anchor: None,
            slot_duration_minutes: None,
            year_end: None,
            tables: HashMap::new(),
            class_name_overrides: HashMap::new(),
            subject_codes: HashMap::new(),
            report: Report::new(source, unit_code),
        }
    }

    pub fn insert(&mut self, category: RefCategory, local_id: &str, resolved: &str) {
        self.tables
            .entry(category)
            .or_default()
            .insert(local_id.to_string(), resolved.to_string());
    }

    pub fn resolve(&self, category: RefCategory, local_id: &str) -> Option<&str> {
        self.tables
            .get(&category)?
            .get(local_id)
            .map(String::as_str)
    }

    /// Applies the operator mapping to a vendor class name.
    pub fn class_name(&self, vendor_name: &str) -> String {
        self.class_name_overrides
            .get(vendor_name)
            .cloned()
            .unwrap_or_else(|| vendor_name.to_string())
    }

    /// External id convention for nodes scoped to this unit.
    pub fn scoped_external_id(&self, suffix: &str) -> String {
        format!("{}${}", self.unit_external_id, suffix)
    }
}
