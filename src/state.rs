use crate::error::{AppError, FetchError};
use crate::model::Snapshot;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing requested yet.
    Idle,
    /// A request is in flight; `attempt` is 1 for the first try.
    Fetching { attempt: u32 },
    Ready,
    /// Retries exhausted. Any earlier snapshot is still kept.
    Failed { message: String, attempts: u32 },
}

/// What consumers see: the last good snapshot plus how fetching is going.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub fetched_at: Option<Instant>,
    pub fetched_at_wall: Option<SystemTime>,
    pub status: FetchStatus,
}

impl QueryState {
    fn new() -> Self {
        Self {
            snapshot: None,
            fetched_at: None,
            fetched_at_wall: None,
            status: FetchStatus::Idle,
        }
    }

    /// True when nothing was fetched yet or the last success is older than `stale_after`.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        match self.fetched_at {
            Some(fetched_at) => now.saturating_duration_since(fetched_at) >= stale_after,
            None => true,
        }
    }
}

/// Identifies one issued request. Later requests carry larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    /// A newer request was issued, or the store was closed, before this one finished.
    Discarded,
}

#[derive(Debug)]
pub struct SnapshotStore {
    state: QueryState,
    state_tx: watch::Sender<QueryState>,
    issued: u64,
    /// The newest request, until it completes or its driver gives up.
    pending: Option<RequestTicket>,
    closed: bool,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (state_tx, _state_rx) = watch::channel(QueryState::new());
        Self {
            state: QueryState::new(),
            state_tx,
            issued: 0,
            pending: None,
            closed: false,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state_tx.subscribe()
    }

    /// Issue a new request, superseding any request still in flight.
    pub fn begin_request(&mut self) -> Result<RequestTicket, AppError> {
        if self.closed {
            return Err(AppError::Shutdown);
        }
        self.issued += 1;
        let ticket = RequestTicket(self.issued);
        self.pending = Some(ticket);
        self.state.status = FetchStatus::Fetching { attempt: 1 };
        self.publish();
        Ok(ticket)
    }

    /// Issue a new request only if none is in flight. `None` means the
    /// caller should rely on the pending one.
    pub fn begin_request_if_idle(&mut self) -> Result<Option<RequestTicket>, AppError> {
        if self.closed {
            return Err(AppError::Shutdown);
        }
        if self.pending.is_some() {
            return Ok(None);
        }
        self.begin_request().map(Some)
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget `ticket` as in flight without applying anything, e.g. when its
    /// driver was cancelled. No-op once it completed or was superseded.
    pub fn release(&mut self, ticket: RequestTicket) {
        if self.pending == Some(ticket) {
            debug!(request = ticket.0, "Abandoned fetch released");
            self.pending = None;
        }
    }

    /// Whether results for `ticket` would still be applied.
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        !self.closed && ticket.0 == self.issued
    }

    /// Record that `ticket` is retrying. Returns false if the request is superseded.
    pub fn mark_attempt(&mut self, ticket: RequestTicket, attempt: u32) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state.status = FetchStatus::Fetching { attempt };
        self.publish();
        true
    }

    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        result: Result<Snapshot, FetchError>,
        attempts: u32,
        now: Instant,
    ) -> Completion {
        if !self.is_current(ticket) {
            debug!(
                request = ticket.0,
                latest = self.issued,
                closed = self.closed,
                "Discarding superseded fetch result"
            );
            return Completion::Discarded;
        }
        self.pending = None;

        match result {
            Ok(snapshot) => {
                self.state.snapshot = Some(Arc::new(snapshot));
                self.state.fetched_at = Some(now);
                self.state.fetched_at_wall = Some(SystemTime::now());
                self.state.status = FetchStatus::Ready;
                self.publish();
                Completion::Applied
            }
            Err(err) => {
                self.state.status = FetchStatus::Failed {
                    message: err.to_string(),
                    attempts,
                };
                self.publish();
                Completion::Failed
            }
        }
    }

    /// Stop accepting results; anything still in flight is dropped on completion.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
