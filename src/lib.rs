//! Timetable import core.
//!
//! Parses a decrypted vendor export (one of two XML dialects), resolves
//! every referenced person and label against the organizational graph,
//! materializes course occurrences keyed by content checksum into the
//! document store, and sweeps stale occurrences from previous runs.
//!
//! The caller supplies the store clients and the payload; this crate never
//! touches files, keys, or network transports itself.

pub mod assembler;
pub mod checksum;
pub mod context;
pub mod coordinator;
pub mod course;
pub mod dialect;
pub mod documents;
pub mod error;
pub mod graph;
pub mod personnel;
pub mod report;
pub mod run;
pub mod weeks;
pub mod xml;

pub use context::{ImportContext, RefCategory};
pub use dialect::Dialect;
pub use documents::DocumentClient;
pub use error::{ImportError, Result, StoreError};
pub use graph::{GraphBatch, GraphClient, GraphStatement};
pub use report::{IgnoredRecord, Report};
pub use run::{import, import_at};
