//! Dialect capability sets.
//!
//! The two vendor export dialects differ only in vocabulary and a couple of
//! matching rules. Each dialect supplies configuration: a source tag, the
//! teacher-matching rules, and a tag/attribute rename table. The shared
//! pipeline does everything else; dialects never override behavior.

mod dialect_a;
mod dialect_b;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    SchoolYear,
    ScheduleGrid,
    Room,
    Equipment,
    Subject,
    Class,
    Group,
    Teacher,
    Staff,
    Student,
    Course,
}

/// One recognized vendor element: its tag, the canonical tag it maps to,
/// and its attribute renames. Attributes not listed pass through unchanged.
pub struct ElementSpec {
    pub tag: &'static str,
    pub canon: &'static str,
    pub kind: EntityKind,
    pub fields: &'static [(&'static str, &'static str)],
}

pub struct DialectSpec {
    /// Source tag recorded on created graph nodes and membership edges, and
    /// checked against the unit's configured timetable source.
    pub source: &'static str,
    /// Canonical attribute holding the vendor's natural personnel id, when
    /// the dialect has one. Entities without it fall back to the checksum
    /// rule.
    pub teacher_id_attribute: Option<&'static str>,
    /// Whether natural personnel ids are unit-local and need the unit
    /// prefix to become external ids. Registry-wide ids are already in the
    /// graph's own value space and are used as-is; checksum fallbacks are
    /// always unit-scoped.
    pub scoped_personnel_ids: bool,
    /// Graph property the bootstrap teacher-mapping query matches on.
    pub graph_match_attribute: &'static str,
    /// Dialect B places one recurrence mask on the course element instead of
    /// one per placement child.
    pub course_level_mask: bool,
    pub elements: &'static [ElementSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    A,
    B,
}

impl Dialect {
    pub fn spec(&self) -> &'static DialectSpec {
        match self {
            Dialect::A => &dialect_a::SPEC,
            Dialect::B => &dialect_b::SPEC,
        }
    }
}

impl DialectSpec {
    pub fn recognized_tags(&self) -> Vec<&'static str> {
        self.elements.iter().map(|e| e.tag).collect()
    }

    fn element(&self, tag: &str) -> Option<&ElementSpec> {
        self.elements.iter().find(|e| e.tag == tag)
    }

    /// Renames an assembled entity into canonical vocabulary: the entity's
    /// own attributes via its rename table, each child list's key to the
    /// child element's canonical tag and its attributes likewise.
    pub fn canonicalize(&self, tag: &str, record: &Value) -> Option<(EntityKind, Value)> {
        let element = self.element(tag)?;
        let source = record.as_object()?;
        let mut out = Map::new();
        for (key, value) in source {
            match value {
                Value::Array(children) => {
                    let (child_key, child_spec) = match self.element(key) {
                        Some(cs) => (cs.canon.to_string(), Some(cs)),
                        None => (key.clone(), None),
                    };
                    let renamed: Vec<Value> = children
                        .iter()
                        .map(|c| rename_attrs(c, child_spec.map(|s| s.fields)))
                        .collect();
                    out.insert(child_key, Value::Array(renamed));
                }
                other => {
                    out.insert(rename_key(key, element.fields), other.clone());
                }
            }
        }
        Some((element.kind, Value::Object(out)))
    }
}

fn rename_key(key: &str, fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| key.to_string())
}

fn rename_attrs(child: &Value, fields: Option<&'static [(&'static str, &'static str)]>) -> Value {
    let Some(obj) = child.as_object() else {
        return child.clone();
    };
    let Some(fields) = fields else {
        return child.clone();
    };
    let mut out = Map::new();
    for (key, value) in obj {
        out.insert(rename_key(key, fields), value.clone());
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialect_a_renames_course_and_children() {
        let spec = Dialect::A.spec();
        let record = json!({
            "Day": "2",
            "StartSlot": "4",
            "SlotCount": "4",
            "Subject": [{"Id": "195"}],
            "Teacher": [{"Id": "54", "Weeks": "28"}],
            "Device": [{"Id": "9", "Weeks": "28"}],
        });
        let (kind, canon) = spec.canonicalize("Course", &record).expect("recognized");
        assert_eq!(kind, EntityKind::Course);
        assert_eq!(canon["day"], json!("2"));
        assert_eq!(canon["startSlot"], json!("4"));
        assert_eq!(canon["Teacher"][0]["weeks"], json!("28"));
        // Vendor "Device" children land under the canonical Equipment tag.
        assert_eq!(canon["Equipment"][0]["id"], json!("9"));
    }

    #[test]
    fn dialect_b_renames_lesson_vocabulary() {
        let spec = Dialect::B.spec();
        let record = json!({
            "day": "2",
            "slot": "4",
            "span": "4",
            "weeks": "28",
            "topic": [{"code": "M195"}],
            "tutor": [{"code": "54"}],
            "venue": [{"code": "56"}],
        });
        let (kind, canon) = spec.canonicalize("lesson", &record).expect("recognized");
        assert_eq!(kind, EntityKind::Course);
        assert_eq!(canon["startSlot"], json!("4"));
        assert_eq!(canon["slotCount"], json!("4"));
        assert_eq!(canon["weeks"], json!("28"));
        assert_eq!(canon["Subject"][0]["id"], json!("M195"));
        assert_eq!(canon["Room"][0]["id"], json!("56"));
    }

    #[test]
    fn unknown_tags_are_not_canonicalized() {
        assert!(Dialect::A.spec().canonicalize("Holiday", &json!({})).is_none());
    }
}
