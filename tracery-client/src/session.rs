//! Lineage viewing session
//!
//! A [`LineageSession`] owns the visible graph and wires the query lifecycle,
//! the collapse walk and the layout engine together. Showing a flowfile's
//! lineage replaces the graph; expanding an event merges new results into it;
//! collapsing removes the branch the event spawned. Every successful mutation
//! ends with a freshly computed layout so the caller always renders from a
//! consistent snapshot.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use tracery_core::{plan_collapse, EventType, LineageGraph, Timeline};
use tracery_layout::{compute_layout, Layout, LayoutConfig};

use crate::api::{LineageApi, LineageRequest};
use crate::lifecycle::{LineageQueryDriver, PollBackoff, QueryOutcome};
use crate::{Error, Result};

/// Outcome of a session operation, for the rendering boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The graph changed; render from this layout
    Updated(Layout),
    /// The query finished but produced nothing; the graph is unchanged
    NoResults,
    /// The caller cancelled; the graph is unchanged
    Cancelled,
}

/// Stateful lineage viewing session over one graph.
pub struct LineageSession<A: LineageApi> {
    api: Arc<A>,
    graph: LineageGraph,
    layout_config: LayoutConfig,
    backoff: PollBackoff,
    cluster_node_id: Option<String>,
}

impl<A: LineageApi> LineageSession<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            graph: LineageGraph::new(),
            layout_config: LayoutConfig::default(),
            backoff: PollBackoff::default(),
            cluster_node_id: None,
        }
    }

    pub fn with_layout_config(mut self, config: LayoutConfig) -> Self {
        self.layout_config = config;
        self
    }

    pub fn with_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Pin all requests to one cluster node.
    pub fn with_cluster_node_id(mut self, cluster_node_id: impl Into<String>) -> Self {
        self.cluster_node_id = Some(cluster_node_id.into());
        self
    }

    /// The currently visible graph.
    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    /// Compute positions for the currently visible graph.
    pub fn layout(&self) -> Layout {
        compute_layout(&self.graph, &self.layout_config)
    }

    /// Event-time slider over the currently visible graph, if it has a
    /// time range.
    pub fn timeline(&self) -> Option<Timeline> {
        Timeline::for_graph(&self.graph)
    }

    /// Query the full lineage of `uuid`, replacing the visible graph.
    pub async fn show_lineage(
        &mut self,
        uuid: &str,
        cancel: CancellationToken,
    ) -> Result<SessionUpdate> {
        let request = LineageRequest::flowfile(uuid, self.cluster_node_id.clone());
        self.run_query(&request, cancel, true).await
    }

    /// Query the ancestors of `event_id` and merge them into the graph.
    pub async fn expand_parents(
        &mut self,
        event_id: &str,
        cancel: CancellationToken,
    ) -> Result<SessionUpdate> {
        self.ensure_expandable(event_id)?;
        let request = LineageRequest::parents(event_id, self.cluster_node_id.clone());
        self.run_query(&request, cancel, false).await
    }

    /// Query the descendants of `event_id` and merge them into the graph.
    pub async fn expand_children(
        &mut self,
        event_id: &str,
        cancel: CancellationToken,
    ) -> Result<SessionUpdate> {
        self.ensure_expandable(event_id)?;
        let request = LineageRequest::children(event_id, self.cluster_node_id.clone());
        self.run_query(&request, cancel, false).await
    }

    /// Collapse the branch hanging off `event_id`.
    ///
    /// Fetches the event's identity detail, walks the graph for the nodes
    /// and links that flow from it, and removes them as one batch.
    pub async fn collapse(&mut self, event_id: &str) -> Result<SessionUpdate> {
        self.ensure_expandable(event_id)?;

        let detail = self
            .api
            .get_event(event_id, self.cluster_node_id.as_deref())
            .await?;

        let plan = plan_collapse(
            &self.graph,
            event_id,
            &detail.flow_file_uuid,
            &detail.child_uuids,
        );
        info!(
            event_id,
            nodes = plan.node_ids.len(),
            links = plan.link_ids.len(),
            "Collapsing lineage branch"
        );
        self.graph.apply_removals(&plan);

        Ok(SessionUpdate::Updated(self.layout()))
    }

    /// Check that `event_id` is a visible event whose type supports
    /// expansion and collapse.
    fn ensure_expandable(&self, event_id: &str) -> Result<()> {
        let node = self
            .graph
            .node(event_id)
            .ok_or_else(|| Error::EventNotFound(event_id.to_string()))?;

        let expandable = node
            .event_type
            .as_ref()
            .is_some_and(EventType::is_expandable);
        if !expandable {
            return Err(Error::NotExpandable(event_id.to_string()));
        }
        Ok(())
    }

    async fn run_query(
        &mut self,
        request: &LineageRequest,
        cancel: CancellationToken,
        reset: bool,
    ) -> Result<SessionUpdate> {
        let mut driver = LineageQueryDriver::new(self.api.clone())
            .with_backoff(self.backoff.clone())
            .with_cancellation_token(cancel);

        match driver.run(request).await? {
            QueryOutcome::Complete(results) => {
                if reset {
                    self.graph.clear();
                }
                self.graph.merge_results(&results);
                info!(
                    nodes = self.graph.node_count(),
                    links = self.graph.link_count(),
                    "Lineage graph updated"
                );
                Ok(SessionUpdate::Updated(self.layout()))
            }
            QueryOutcome::Empty => Ok(SessionUpdate::NoResults),
            QueryOutcome::Cancelled => Ok(SessionUpdate::Cancelled),
        }
    }
}
