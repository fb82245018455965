use crate::error::IngestError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::{index_queue_key, IndexStore, Skeleton, INDEXED_TAGS_KEY};
use upstream::UpstreamClient;

/// Default minimum wall-clock gap enforced between consecutive successful
/// fetches.
pub const DEFAULT_MIN_DOWNLOAD_DELAY: Duration = Duration::from_secs(1);

/// Long-running task: drains per-tag queues, downloads, fingerprints, and
/// inserts each skeleton.
pub struct Fetcher {
    kv: Arc<dyn store::KvStore>,
    index: IndexStore,
    upstream: Arc<UpstreamClient>,
    min_download_delay: Duration,
}

impl Fetcher {
    pub fn new(kv: Arc<dyn store::KvStore>, upstream: Arc<UpstreamClient>) -> Self {
        let index = IndexStore::new(kv.clone());
        Self {
            kv,
            index,
            upstream,
            min_download_delay: DEFAULT_MIN_DOWNLOAD_DELAY,
        }
    }

    pub fn with_min_download_delay(mut self, delay: Duration) -> Self {
        self.min_download_delay = delay;
        self
    }

    /// Run forever: one round-robin pass over every monitored tag per
    /// iteration, continuing immediately when queues are non-empty.
    pub async fn run(&self) -> Result<(), IngestError> {
        loop {
            self.run_once().await?;
        }
    }

    /// One strict round-robin pass: at most one skeleton popped per tag.
    pub async fn run_once(&self) -> Result<(), IngestError> {
        let tags = self.kv.lrange(INDEXED_TAGS_KEY, 0, -1).await?;
        let tags: Vec<String> = tags
            .into_iter()
            .map(String::from_utf8)
            .collect::<Result<_, _>>()
            .map_err(store::StoreError::InvalidUtf8)?;

        for tag in tags {
            self.fetch_one(&tag).await?;
        }
        Ok(())
    }

    /// Pop and process a single skeleton for `tag`, if the queue is
    /// non-empty. Never returns an error for a failed *download*: those
    /// are caught and recorded as a permanent skip. Only a KV failure
    /// propagates.
    async fn fetch_one(&self, tag: &str) -> Result<(), IngestError> {
        let queue_key = index_queue_key(tag);
        let raw = match self.kv.rpop(&queue_key).await? {
            Some(raw) => raw,
            None => return Ok(()),
        };

        let t1 = Instant::now();
        let skeleton: Skeleton = serde_json::from_slice(&raw)?;

        let Some(url) = skeleton.src_url.clone() else {
            self.kv
                .sadd(&store::indexed_key(&skeleton.src), skeleton.src_id.as_bytes())
                .await?;
            return Ok(());
        };

        match self.upstream.fetch_image(&url).await {
            Ok(image) => {
                let imhash = fingerprint::Fingerprint::from_image(&image);
                drop(image);

                let entry = skeleton.clone().evolve(imhash);
                self.index.insert(&entry).await?;
                self.kv
                    .srem(&store::awaiting_index_key(&skeleton.src), skeleton.src_id.as_bytes())
                    .await?;
                tracing::info!(src = %skeleton.src, src_id = %skeleton.src_id, "fetcher indexed post");
            }
            Err(err) => {
                tracing::warn!(src = %skeleton.src, src_id = %skeleton.src_id, error = %err, "fetch failed, marking permanently skipped");
                self.kv
                    .sadd(&store::indexed_key(&skeleton.src), skeleton.src_id.as_bytes())
                    .await?;
            }
        }

        let elapsed = t1.elapsed();
        if elapsed < self.min_download_delay {
            tokio::time::sleep(self.min_download_delay - elapsed).await;
        }

        Ok(())
    }
}
