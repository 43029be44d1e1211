//! Provenance lineage data model
//!
//! These types double as the wire shapes returned by the lineage service
//! (camelCase JSON), so the query client can deserialize straight into them
//! and hand them to the graph store.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Kind of node in a lineage graph.
///
/// The `Ord` impl matches the order of the wire strings (`EVENT` sorts before
/// `FLOWFILE`), which the layout comparators rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// A provenance event recorded by the pipeline
    Event,

    /// A unit-of-data instance
    #[serde(rename = "FLOWFILE")]
    FlowFile,
}

/// Type of a provenance event.
///
/// Variants are declared in wire-string (alphabetical) order so the derived
/// `Ord` matches a comparison of the serialized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    AttributesModified,
    Clone,
    ContentModified,
    Create,
    Drop,
    Expire,
    Fork,
    Join,
    Receive,
    Replay,
    Route,
    Send,
    Spawn,
    /// Fallback for event types introduced after this client was built
    #[serde(other)]
    Unknown,
}

impl EventType {
    /// Whether lineage can be expanded or collapsed around this event.
    ///
    /// Only events that split or join a flow of identity (spawn, clone, fork,
    /// join, replay) anchor an expansion; everything else is a point on an
    /// existing flow.
    pub fn is_expandable(&self) -> bool {
        matches!(
            self,
            EventType::Spawn
                | EventType::Clone
                | EventType::Fork
                | EventType::Join
                | EventType::Replay
        )
    }
}

/// A node in the lineage graph: either a flowfile or a provenance event.
///
/// Layout positions are not part of the model; they are produced per layout
/// pass and keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceNode {
    /// Unique, stable identifier
    pub id: String,

    /// Node kind (`type` on the wire)
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Event type; absent for flowfile nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,

    /// Identity of the flowfile this node belongs to
    pub flow_file_uuid: String,

    /// Identities of declared parent flowfiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_uuids: Vec<String>,

    /// Identities of declared child flowfiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_uuids: Vec<String>,

    /// Server-formatted event time, passed through for display
    #[serde(default)]
    pub timestamp: String,

    /// Epoch-derived sortable event time in milliseconds
    pub millis: i64,
}

impl ProvenanceNode {
    /// Event time as a UTC instant, if `millis` is in range.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.millis).single()
    }
}

/// Wire shape of a link in a lineage result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPayload {
    pub source_id: String,
    pub target_id: String,
    pub flow_file_uuid: String,
    pub millis: i64,
}

/// A directed edge between two nodes for one flow of identity.
///
/// Links store node ids, never references; the graph store resolves them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceLink {
    /// Synthetic id, `source_id + "-" + target_id`
    pub id: String,

    pub source_id: String,
    pub target_id: String,

    /// Identity of the flowfile carried over this edge
    pub flow_file_uuid: String,

    /// Event time of the edge in milliseconds
    pub millis: i64,
}

impl ProvenanceLink {
    /// The synthetic link id for a source/target pair.
    pub fn link_id(source_id: &str, target_id: &str) -> String {
        format!("{}-{}", source_id, target_id)
    }
}

impl From<LinkPayload> for ProvenanceLink {
    fn from(payload: LinkPayload) -> Self {
        Self {
            id: Self::link_id(&payload.source_id, &payload.target_id),
            source_id: payload.source_id,
            target_id: payload.target_id,
            flow_file_uuid: payload.flow_file_uuid,
            millis: payload.millis,
        }
    }
}

/// Result payload of a finished lineage computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageResults {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ProvenanceNode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkPayload>,

    /// Errors reported by the server-side computation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
