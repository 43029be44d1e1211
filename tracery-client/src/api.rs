//! HTTP API for the provenance lineage service
//!
//! The service computes lineage asynchronously: `POST` submits a request and
//! returns a handle (`uri`), `GET` on the handle reports progress and
//! eventually the results, `DELETE` drops the server-side computation.
//! Event details come from a separate events endpoint.
//!
//! [`LineageApi`] is the seam the lifecycle driver and session depend on;
//! [`HttpLineageApi`] is the reqwest implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use tracery_core::{EventType, LineageResults};

use crate::Result;

/// Kind of lineage computation to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineageRequestType {
    /// Full lineage of one flowfile
    #[serde(rename = "FLOWFILE")]
    FlowFile,

    /// Ancestors of one event
    #[serde(rename = "PARENTS")]
    Parents,

    /// Descendants of one event
    #[serde(rename = "CHILDREN")]
    Children,
}

/// Body of a lineage submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageRequest {
    pub lineage_request_type: LineageRequestType,

    /// Flowfile identity; required for [`LineageRequestType::FlowFile`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Event id; required for PARENTS and CHILDREN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    /// Routing hint for clustered deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_node_id: Option<String>,
}

impl LineageRequest {
    /// Full lineage of the given flowfile.
    pub fn flowfile(uuid: impl Into<String>, cluster_node_id: Option<String>) -> Self {
        Self {
            lineage_request_type: LineageRequestType::FlowFile,
            uuid: Some(uuid.into()),
            event_id: None,
            cluster_node_id,
        }
    }

    /// Ancestors of the given event.
    pub fn parents(event_id: impl Into<String>, cluster_node_id: Option<String>) -> Self {
        Self {
            lineage_request_type: LineageRequestType::Parents,
            uuid: None,
            event_id: Some(event_id.into()),
            cluster_node_id,
        }
    }

    /// Descendants of the given event.
    pub fn children(event_id: impl Into<String>, cluster_node_id: Option<String>) -> Self {
        Self {
            lineage_request_type: LineageRequestType::Children,
            uuid: None,
            event_id: Some(event_id.into()),
            cluster_node_id,
        }
    }
}

/// One outstanding lineage computation as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageDto {
    /// Opaque handle for polling and cleanup
    pub uri: String,

    #[serde(default)]
    pub percent_completed: u32,

    #[serde(default)]
    pub finished: bool,

    /// Routing hint, echoed back on polls and cleanup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_node_id: Option<String>,

    /// Populated once `finished` is true; `errors` may arrive earlier
    #[serde(default)]
    pub results: LineageResults,
}

/// Envelope of lineage submit/poll responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEntity {
    pub lineage: LineageDto,
}

/// Detail of a single provenance event, from the events endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEventDto {
    pub id: String,
    pub flow_file_uuid: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_uuids: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_uuids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
}

/// Envelope of event detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEventEntity {
    pub provenance_event: ProvenanceEventDto,
}

/// Abstraction over the lineage service.
///
/// The lifecycle driver and session depend on this seam so tests can script
/// responses without a server.
#[async_trait]
pub trait LineageApi: Send + Sync {
    /// Submit a lineage computation; returns the initial status.
    async fn submit_lineage(&self, request: &LineageRequest) -> Result<LineageDto>;

    /// Poll an outstanding computation for updated status.
    async fn get_lineage(&self, lineage: &LineageDto) -> Result<LineageDto>;

    /// Drop an outstanding computation on the server. Best effort; callers
    /// ignore the response.
    async fn delete_lineage(&self, lineage: &LineageDto) -> Result<()>;

    /// Fetch the detail of a single provenance event.
    async fn get_event(
        &self,
        event_id: &str,
        cluster_node_id: Option<&str>,
    ) -> Result<ProvenanceEventDto>;
}

/// Default timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed implementation of [`LineageApi`].
pub struct HttpLineageApi {
    lineage_url: String,
    events_url: String,
    client: reqwest::Client,
}

impl HttpLineageApi {
    /// Create a client against the given API base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            lineage_url: format!("{}/provenance/lineage", base),
            events_url: format!("{}/provenance/events", base),
            client,
        })
    }

    fn cluster_query(cluster_node_id: Option<&str>) -> Vec<(&'static str, String)> {
        cluster_node_id
            .map(|id| vec![("clusterNodeId", id.to_string())])
            .unwrap_or_default()
    }
}

#[async_trait]
impl LineageApi for HttpLineageApi {
    async fn submit_lineage(&self, request: &LineageRequest) -> Result<LineageDto> {
        let entity: LineageEntity = self
            .client
            .post(&self.lineage_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entity.lineage)
    }

    async fn get_lineage(&self, lineage: &LineageDto) -> Result<LineageDto> {
        let entity: LineageEntity = self
            .client
            .get(&lineage.uri)
            .query(&Self::cluster_query(lineage.cluster_node_id.as_deref()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entity.lineage)
    }

    async fn delete_lineage(&self, lineage: &LineageDto) -> Result<()> {
        self.client
            .delete(&lineage.uri)
            .query(&Self::cluster_query(lineage.cluster_node_id.as_deref()))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn get_event(
        &self,
        event_id: &str,
        cluster_node_id: Option<&str>,
    ) -> Result<ProvenanceEventDto> {
        let url = format!("{}/{}", self.events_url, event_id);
        let entity: ProvenanceEventEntity = self
            .client
            .get(&url)
            .query(&Self::cluster_query(cluster_node_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entity.provenance_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_to_wire_shape() {
        let request = LineageRequest::flowfile("abc", Some("node-1".to_string()));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["lineageRequestType"], "FLOWFILE");
        assert_eq!(json["uuid"], "abc");
        assert_eq!(json["clusterNodeId"], "node-1");
        assert!(json.get("eventId").is_none());

        let request = LineageRequest::parents("42", None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["lineageRequestType"], "PARENTS");
        assert_eq!(json["eventId"], "42");
        assert!(json.get("clusterNodeId").is_none());
    }

    #[test]
    fn test_lineage_dto_defaults_for_sparse_responses() {
        let dto: LineageDto = serde_json::from_str(r#"{"uri": "/lineage/1"}"#).unwrap();
        assert!(!dto.finished);
        assert_eq!(dto.percent_completed, 0);
        assert!(dto.results.nodes.is_empty());
        assert!(dto.results.errors.is_empty());
    }

    #[test]
    fn test_event_detail_deserializes() {
        let json = r#"{
            "provenanceEvent": {
                "id": "7",
                "flowFileUuid": "abc",
                "childUuids": ["def", "ghi"],
                "eventType": "SPAWN"
            }
        }"#;
        let entity: ProvenanceEventEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.provenance_event.flow_file_uuid, "abc");
        assert_eq!(entity.provenance_event.event_type, Some(EventType::Spawn));
        assert!(entity.provenance_event.parent_uuids.is_empty());
    }
}
