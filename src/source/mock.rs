use crate::error::FetchError;
use crate::model::Snapshot;
use crate::source::SnapshotSource;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Snapshot(Snapshot),
    HttpStatus(u16),
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub delay: Duration,
    pub outcome: MockOutcome,
}

impl MockResponse {
    pub fn ok(snapshot: Snapshot) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: MockOutcome::Snapshot(snapshot),
        }
    }

    pub fn fail(status: u16) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: MockOutcome::HttpStatus(status),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scripted source: each `fetch` takes the next response in order.
///
/// The response is picked when `fetch` is called, so issue order decides which
/// request gets which response even if completions are reordered by delays.
#[derive(Debug, Default)]
pub struct MockSource {
    script: Mutex<VecDeque<MockResponse>>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().ok()?.pop_front()
    }
}

impl SnapshotSource for MockSource {
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, FetchError>> + Send {
        let response = self.next_response();
        async move {
            let Some(response) = response else {
                return Err(FetchError::Protocol("mock script exhausted".to_string()));
            };
            if !response.delay.is_zero() {
                tokio::time::sleep(response.delay).await;
            }
            match response.outcome {
                MockOutcome::Snapshot(snapshot) => Ok(snapshot),
                MockOutcome::HttpStatus(status) => Err(FetchError::Http {
                    status,
                    body: "mock failure".to_string(),
                }),
            }
        }
    }
}
