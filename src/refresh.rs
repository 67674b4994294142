//! Refresh policy and the task that keeps the snapshot current.
//!
//! Three things trigger a fetch: startup, the fixed poll interval and focus
//! regain (only when the data is stale). Ticks and focus events that arrive
//! while a fetch is still running merge into it instead of replacing it. Each
//! fetch retries up to [`RefreshPolicy::retry`] extra times. The last good
//! snapshot stays visible throughout; see [`SnapshotStore`] for how
//! overlapping requests are ordered.

use crate::error::AppError;
use crate::source::SnapshotSource;
use crate::state::{Completion, QueryState, RequestTicket, SnapshotStore};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(45);
pub const DEFAULT_RETRY: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// How long a fetched snapshot counts as fresh.
    pub stale_after: Duration,
    /// Unconditional refresh cadence.
    pub poll_interval: Duration,
    /// Additional attempts after the first failure.
    pub retry: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub refetch_on_focus: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: DEFAULT_RETRY,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            refetch_on_focus: true,
        }
    }
}

impl RefreshPolicy {
    /// Delay before retry number `retry` (1-based): doubling, capped.
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.retry_base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.retry_max_delay)
    }

    pub fn should_refetch_on_focus(&self, state: &QueryState, now: Instant) -> bool {
        self.refetch_on_focus && state.is_stale(now, self.stale_after)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { attempts: u32 },
    Failed { attempts: u32 },
    Discarded,
    /// Focus regained while the data was still fresh.
    Skipped,
    /// A request was already in flight; its result will be applied instead.
    Coalesced,
}

/// Releases the in-flight marker if the request's driver is dropped early.
struct PendingRequest<'a> {
    store: &'a RwLock<SnapshotStore>,
    ticket: RequestTicket,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.store.write() {
            guard.release(self.ticket);
        }
    }
}

/// Explicitly constructed handle around one source and its policy.
///
/// Cloning shares the same store, so every clone sees the same snapshot.
#[derive(Debug)]
pub struct Refresher<S> {
    source: Arc<S>,
    policy: RefreshPolicy,
    store: Arc<RwLock<SnapshotStore>>,
}

impl<S> Clone for Refresher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            policy: self.policy.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SnapshotSource> Refresher<S> {
    pub fn new(source: S, policy: RefreshPolicy) -> Self {
        Self::with_source(Arc::new(source), policy)
    }

    pub fn with_source(source: Arc<S>, policy: RefreshPolicy) -> Self {
        Self {
            source,
            policy,
            store: Arc::new(RwLock::new(SnapshotStore::new())),
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    pub fn store(&self) -> Arc<RwLock<SnapshotStore>> {
        Arc::clone(&self.store)
    }

    pub fn subscribe(&self) -> Result<watch::Receiver<QueryState>, AppError> {
        let guard = self.store.read().map_err(|_| AppError::StateLock)?;
        Ok(guard.subscribe())
    }

    pub fn current(&self) -> Result<QueryState, AppError> {
        let guard = self.store.read().map_err(|_| AppError::StateLock)?;
        Ok(guard.state().clone())
    }

    /// Issue a new request, superseding any in flight, retry per policy and
    /// apply the result if it is still current.
    pub async fn refresh(&self) -> Result<RefreshOutcome, AppError> {
        let ticket = {
            let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
            guard.begin_request()?
        };
        self.drive(ticket).await
    }

    /// Like [`Refresher::refresh`], but merges into a request already in flight.
    pub async fn refresh_if_idle(&self) -> Result<RefreshOutcome, AppError> {
        let ticket = {
            let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
            guard.begin_request_if_idle()?
        };
        match ticket {
            Some(ticket) => self.drive(ticket).await,
            None => {
                debug!("Request already in flight, joining it");
                Ok(RefreshOutcome::Coalesced)
            }
        }
    }

    async fn drive(&self, ticket: RequestTicket) -> Result<RefreshOutcome, AppError> {
        let _pending = PendingRequest {
            store: &self.store,
            ticket,
        };
        let mut attempt = 1;
        loop {
            let result = self.source.fetch().await;
            let err = match result {
                Ok(snapshot) => {
                    let completion = {
                        let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
                        guard.complete(ticket, Ok(snapshot), attempt, Instant::now())
                    };
                    return Ok(match completion {
                        Completion::Applied => {
                            debug!(attempts = attempt, "Snapshot refreshed");
                            RefreshOutcome::Applied { attempts: attempt }
                        }
                        Completion::Failed => RefreshOutcome::Failed { attempts: attempt },
                        Completion::Discarded => RefreshOutcome::Discarded,
                    });
                }
                Err(err) => err,
            };

            if attempt > self.policy.retry {
                warn!(attempts = attempt, error = %err, "Fetch failed, retries exhausted");
                let completion = {
                    let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
                    guard.complete(ticket, Err(err), attempt, Instant::now())
                };
                return Ok(match completion {
                    Completion::Discarded => RefreshOutcome::Discarded,
                    _ => RefreshOutcome::Failed { attempts: attempt },
                });
            }

            let delay = self.policy.retry_delay(attempt);
            warn!(
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %err,
                "Fetch failed, retrying"
            );
            attempt += 1;
            let still_current = {
                let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
                guard.mark_attempt(ticket, attempt)
            };
            if !still_current {
                debug!("Request superseded, abandoning retries");
                return Ok(RefreshOutcome::Discarded);
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Refresh on focus regain, but only if the data is stale.
    pub async fn refresh_on_focus(&self) -> Result<RefreshOutcome, AppError> {
        let state = self.current()?;
        if !self.policy.should_refetch_on_focus(&state, Instant::now()) {
            debug!("Focus regained with fresh data, skipping refresh");
            return Ok(RefreshOutcome::Skipped);
        }
        self.refresh_if_idle().await
    }

    /// Stop applying results. In-flight requests finish but are discarded.
    pub fn shutdown(&self) -> Result<(), AppError> {
        let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
        guard.close();
        Ok(())
    }
}

/// Handle to a running refresh loop.
#[derive(Debug)]
pub struct RefreshTask {
    focus_tx: mpsc::Sender<()>,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Notifier for "consuming surface regained focus" events.
    pub fn focus(&self) -> FocusNotifier {
        FocusNotifier {
            focus_tx: self.focus_tx.clone(),
        }
    }

    /// Tear down: discard outstanding results and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "Refresh loop ended abnormally");
        }
    }
}

#[derive(Debug, Clone)]
pub struct FocusNotifier {
    focus_tx: mpsc::Sender<()>,
}

impl FocusNotifier {
    pub fn new(focus_tx: mpsc::Sender<()>) -> Self {
        Self { focus_tx }
    }

    pub fn notify(&self) {
        // A pending focus event already covers this one.
        let _ = self.focus_tx.try_send(());
    }
}

/// Start the refresh loop: fetch now, then on every poll tick and focus event.
///
/// Fetches run as separate tasks so a slow request never delays the loop. A
/// tick or focus event that finds a fetch still running joins it, so a slow
/// upstream delays refreshes but never starves them.
pub fn spawn_refresh_loop<S: SnapshotSource>(refresher: Refresher<S>) -> RefreshTask {
    let (focus_tx, mut focus_rx) = mpsc::channel::<()>(1);
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let policy = refresher.policy().clone();
        info!(
            poll_interval_ms = policy.poll_interval.as_millis() as u64,
            stale_after_ms = policy.stale_after.as_millis() as u64,
            retry = policy.retry,
            "Refresh loop started"
        );

        let mut ticker = tokio::time::interval(policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    // A dropped task handle counts as teardown too.
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                // The first tick fires immediately and doubles as the startup fetch.
                _ = ticker.tick() => {
                    let refresher = refresher.clone();
                    inflight.spawn(async move { refresher.refresh_if_idle().await });
                }
                Some(()) = focus_rx.recv() => {
                    let refresher = refresher.clone();
                    inflight.spawn(async move { refresher.refresh_on_focus().await });
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    match joined {
                        Ok(Ok(RefreshOutcome::Failed { attempts })) => {
                            warn!(attempts, "Snapshot refresh failed");
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => warn!(error = %err, "Refresh task error"),
                        Err(err) => warn!(error = %err, "Refresh task panicked or was cancelled"),
                    }
                }
            }
        }

        if let Err(err) = refresher.shutdown() {
            warn!(error = %err, "Failed to close snapshot store");
        }
        inflight.abort_all();
        info!("Refresh loop stopped");
    });

    RefreshTask {
        focus_tx,
        stop_tx,
        handle,
    }
}
