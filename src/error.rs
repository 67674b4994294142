use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
    #[error("refresher is shut down")]
    Shutdown,
}

/// Failure of one fetch attempt against the upstream data collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("connect error: {0}")]
    Connect(std::io::Error),
    #[error("io error: {0}")]
    Io(std::io::Error),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("http status {status} ({body})")]
    Http { status: u16, body: String },
    #[error("invalid http response: {0}")]
    Protocol(String),
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("duplicate location in snapshot: {0}")]
    DuplicateLocation(String),
}
