use serde::Serialize;
use serde_json::Value;

/// One record the run skipped, with the reason it was skipped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredRecord {
    /// Entity kind ("Teacher", "Course", ...).
    pub kind: String,
    pub reason: String,
    /// The offending record as assembled from the export.
    pub record: Value,
}

/// Per-run outcome handed back to the invoking layer. Never persisted here.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub source: String,
    pub unit_code: String,
    pub ignored: Vec<IgnoredRecord>,
    pub errors: Vec<String>,
}

impl Report {
    pub fn new(source: &str, unit_code: &str) -> Self {
        Report {
            source: source.to_string(),
            unit_code: unit_code.to_string(),
            ..Default::default()
        }
    }

    pub fn add_ignored(&mut self, kind: &str, reason: impl Into<String>, record: Value) {
        let reason = reason.into();
        tracing::warn!(kind, %reason, "record ignored");
        self.ignored.push(IgnoredRecord {
            kind: kind.to_string(),
            reason,
            record,
        });
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "import error recorded");
        self.errors.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ignored_and_errors_accumulate() {
        let mut r = Report::new("DIALECT_A", "0951099D");
        assert!(!r.has_errors());
        r.add_ignored("Teacher", "missing last name", json!({"id": "12"}));
        r.add_error("unknown subject reference: 195");
        assert_eq!(r.ignored.len(), 1);
        assert_eq!(r.ignored[0].kind, "Teacher");
        assert!(r.has_errors());
    }
}
