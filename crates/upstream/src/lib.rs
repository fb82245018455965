//! Danbooru-compatible upstream board client.
//!
//! Wraps paginated tag search, single-post lookup, tag autocomplete and
//! image fetch behind a small async client, with bounded retry on
//! transient upstream failures.
//!
//! ```no_run
//! # async fn run() -> Result<(), upstream::UpstreamError> {
//! let client = upstream::UpstreamClient::new("https://danbooru.donmai.us", "boorudex/0.1");
//! let post = client.get_post(1).await?;
//! println!("{:?}", post.rating);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod retry;
mod types;

pub use client::UpstreamClient;
pub use error::UpstreamError;
pub use retry::{execute_with_retry_async, is_retryable_error, RetryConfig, RetryResult};
pub use types::{TagDescriptor, UpstreamPost};
