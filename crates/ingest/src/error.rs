use thiserror::Error;

/// Errors surfaced out of the Discoverer/Fetcher task loops.
///
/// `Store` is deliberately not caught anywhere in this crate: a KV failure
/// propagates to the task's caller (the Supervisor), which treats a task
/// exiting with an error as a crash-and-restart signal rather than
/// something the task itself should retry.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upstream error: {0}")]
    Upstream(#[from] upstream::UpstreamError),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] fingerprint::FingerprintError),

    #[error("malformed skeleton on queue: {0}")]
    MalformedSkeleton(#[from] serde_json::Error),
}
