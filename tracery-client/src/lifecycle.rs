//! Lineage query lifecycle
//!
//! A lineage query is a long-running server-side computation. The driver
//! submits it, polls the returned handle with exponential backoff, and
//! guarantees the server-side resource is cleaned up on every terminal path:
//! completion, failure, and cancellation alike.
//!
//! Cancellation is cooperative through a [`CancellationToken`]. The token is
//! re-checked after each poll response lands, so a response that was already
//! in flight when the user cancelled is discarded instead of being applied.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tracery_core::LineageResults;

use crate::api::{LineageApi, LineageDto, LineageRequest};
use crate::{Error, Result};

/// States of a single lineage query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Not yet submitted
    Idle,
    /// Submitted; initial status received
    Submitted,
    /// Waiting out a backoff delay or a poll response
    Polling,
    /// Completed with results
    Finished,
    /// The server reported errors or a request failed
    Errored,
    /// Cancelled by the caller
    Cancelled,
}

impl QueryState {
    /// Whether the query can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Finished | QueryState::Errored | QueryState::Cancelled
        )
    }
}

impl std::fmt::Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryState::Idle => "idle",
            QueryState::Submitted => "submitted",
            QueryState::Polling => "polling",
            QueryState::Finished => "finished",
            QueryState::Errored => "errored",
            QueryState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Tracks the state of one query and validates transitions.
#[derive(Debug)]
pub struct QueryLifecycle {
    state: QueryState,
}

impl QueryLifecycle {
    pub fn new() -> Self {
        Self {
            state: QueryState::Idle,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: QueryState) -> Result<()> {
        let valid = match (self.state, next) {
            (QueryState::Idle, QueryState::Submitted) => true,
            (QueryState::Submitted, QueryState::Polling)
            | (QueryState::Submitted, QueryState::Finished)
            | (QueryState::Submitted, QueryState::Errored)
            | (QueryState::Submitted, QueryState::Cancelled) => true,
            (QueryState::Polling, QueryState::Polling)
            | (QueryState::Polling, QueryState::Finished)
            | (QueryState::Polling, QueryState::Errored)
            | (QueryState::Polling, QueryState::Cancelled) => true,
            _ => false,
        };

        if !valid {
            return Err(Error::InvalidState(format!(
                "cannot move from {} to {}",
                self.state, next
            )));
        }

        debug!(from = %self.state, to = %next, "Query state transition");
        self.state = next;
        Ok(())
    }
}

impl Default for QueryLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff schedule for polling an unfinished query.
///
/// The delay starts at `initial_delay` and doubles after each poll, capped
/// at `max_delay`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(4),
        }
    }
}

impl PollBackoff {
    /// The delay to wait after a poll that waited `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * self.multiplier).min(self.max_delay)
    }
}

/// How a lineage query ended.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Finished with at least one node
    Complete(LineageResults),
    /// Finished, but the server found nothing
    Empty,
    /// Cancelled before completion
    Cancelled,
}

/// Drives one lineage query from submission to a terminal state.
pub struct LineageQueryDriver<A: LineageApi> {
    api: Arc<A>,
    backoff: PollBackoff,
    lifecycle: QueryLifecycle,
    cancel: CancellationToken,
    progress: watch::Sender<u32>,
}

impl<A: LineageApi> LineageQueryDriver<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            api,
            backoff: PollBackoff::default(),
            lifecycle: QueryLifecycle::new(),
            cancel: CancellationToken::new(),
            progress,
        }
    }

    pub fn with_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this query when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver for completion percentage updates.
    pub fn progress(&self) -> watch::Receiver<u32> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> QueryState {
        self.lifecycle.state()
    }

    /// Submit `request` and poll it to a terminal state.
    ///
    /// The server-side computation is deleted on every exit path. Server
    /// errors surface as [`Error::Computation`]; transport failures as
    /// [`Error::Transport`].
    pub async fn run(&mut self, request: &LineageRequest) -> Result<QueryOutcome> {
        self.lifecycle.transition(QueryState::Submitted)?;

        let mut lineage = match self.api.submit_lineage(request).await {
            Ok(lineage) => lineage,
            Err(e) => {
                self.lifecycle.transition(QueryState::Errored)?;
                return Err(e);
            }
        };

        let mut delay = self.backoff.initial_delay;

        loop {
            // A cancel may have landed while the response was in flight.
            if self.cancel.is_cancelled() {
                return self.finish_cancelled(&lineage).await;
            }

            if !lineage.results.errors.is_empty() {
                let errors = lineage.results.errors.clone();
                self.cleanup(&lineage).await;
                self.lifecycle.transition(QueryState::Errored)?;
                return Err(Error::Computation(errors));
            }

            self.progress.send_replace(lineage.percent_completed);

            if lineage.finished {
                self.cleanup(&lineage).await;
                self.lifecycle.transition(QueryState::Finished)?;
                if lineage.results.nodes.is_empty() {
                    return Ok(QueryOutcome::Empty);
                }
                return Ok(QueryOutcome::Complete(lineage.results));
            }

            self.lifecycle.transition(QueryState::Polling)?;

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return self.finish_cancelled(&lineage).await;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.backoff.next_delay(delay);

            lineage = match self.api.get_lineage(&lineage).await {
                Ok(lineage) => lineage,
                Err(e) => {
                    self.cleanup(&lineage).await;
                    self.lifecycle.transition(QueryState::Errored)?;
                    return Err(e);
                }
            };
        }
    }

    async fn finish_cancelled(&mut self, lineage: &LineageDto) -> Result<QueryOutcome> {
        debug!(uri = %lineage.uri, "Lineage query cancelled");
        self.cleanup(lineage).await;
        self.lifecycle.transition(QueryState::Cancelled)?;
        Ok(QueryOutcome::Cancelled)
    }

    /// Best-effort delete of the server-side computation.
    async fn cleanup(&self, lineage: &LineageDto) {
        if let Err(e) = self.api.delete_lineage(lineage).await {
            warn!(uri = %lineage.uri, error = %e, "Failed to delete lineage computation");
        }
    }
}
