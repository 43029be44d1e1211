//! # Tracery Client
//!
//! Asynchronous client for the provenance lineage service.
//!
//! Lineage is computed out-of-band: the client submits a request, polls the
//! returned handle with exponential backoff until the computation finishes,
//! and cleans the server-side resource up afterwards. A user may cancel at
//! any point in that lifecycle, including while a poll response is in
//! flight, so every completion re-checks the cancellation state before it
//! touches shared state.
//!
//! [`session::LineageSession`] ties the lifecycle to the graph store and the
//! layout engine: expand and collapse operations each end with a fresh set
//! of node positions for the rendering boundary.

pub mod api;
pub mod lifecycle;
pub mod session;

// Re-export commonly used types
pub use api::{HttpLineageApi, LineageApi, LineageRequest, LineageRequestType};
pub use lifecycle::{LineageQueryDriver, PollBackoff, QueryOutcome, QueryState};
pub use session::{LineageSession, SessionUpdate};

/// Result type for lineage client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lineage client operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Lineage computation failed: {}", .0.join("; "))]
    Computation(Vec<String>),

    #[error("Invalid lifecycle transition: {0}")]
    InvalidState(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Event does not support lineage expansion: {0}")]
    NotExpandable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
