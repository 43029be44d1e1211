//! # Tracery Core
//!
//! Data model and graph store for provenance lineage reconstruction.
//!
//! A lineage graph describes how a unit of data ("flowfile") moved through a
//! processing pipeline: flowfile and event nodes connected by directed
//! flow-of-identity links. This crate owns the incremental graph store that
//! the query client merges results into and the layout engine reads from, as
//! well as the collapse walk that prunes branches of the visible graph.

pub mod collapse;
pub mod graph;
pub mod model;
pub mod timeline;

// Re-export commonly used types
pub use collapse::{plan_collapse, CollapseDirection, CollapsePlan};
pub use graph::{LineageGraph, TimeRange};
pub use model::{
    EventType, LineageResults, LinkPayload, NodeKind, ProvenanceLink, ProvenanceNode,
};
pub use timeline::Timeline;

/// Result type for lineage graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lineage graph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Link not found: {0}")]
    LinkNotFound(String),
}
