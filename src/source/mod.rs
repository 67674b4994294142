//! Upstream data collaborator: whatever hands back the current [`Snapshot`].

use crate::error::FetchError;
use crate::model::Snapshot;
use std::future::Future;

pub mod http;
pub mod mock;

/// One read operation returning the current state of all locations.
///
/// Implementations do not retry; the refresher owns retry and staleness policy.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, FetchError>> + Send;
}
