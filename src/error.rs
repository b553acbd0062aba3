use thiserror::Error;

/// Uniform failure envelope returned by both external store clients.
///
/// The stores answer every call with an ok/error status plus a message; a
/// client implementation maps the error side to this type.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
        }
    }
}

/// Fatal import failures. Recoverable problems (malformed entities, missing
/// references on a single course) land in the run's [`Report`](crate::Report)
/// instead and never abort the run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// No unit matches the given establishment code.
    #[error("unknown unit code: {0}")]
    UnknownUnit(String),

    /// The unit is bound to a different timetable source than the dialect
    /// being imported.
    #[error("unit {unit} is bound to timetable source {actual:?}, expected {expected}")]
    SourceMismatch {
        unit: String,
        expected: String,
        actual: Option<String>,
    },

    /// Malformed export payload. Fatal for the whole run.
    #[error("malformed export: {0}")]
    Parse(String),

    /// Phase 2 of the personnel resolver left candidates without a graph id.
    #[error("personnel resolution incomplete: {0} candidate(s) unresolved")]
    UnresolvedPersonnel(usize),

    /// A graph store batch reported a non-ok envelope.
    #[error("graph store error: {0}")]
    Graph(String),

    /// A document store write reported a non-ok envelope.
    #[error("document store error: {0}")]
    Document(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
