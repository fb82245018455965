use crate::error::IngestError;
use std::sync::Arc;
use store::{index_queue_key, Skeleton, INDEXED_TAGS_KEY};
use upstream::UpstreamClient;

/// Long-running task: walks the monitored tag list, enqueues unseen posts
/// as skeleton entries.
pub struct Discoverer {
    kv: Arc<dyn store::KvStore>,
    upstream: Arc<UpstreamClient>,
    exclude_tags: Vec<String>,
    sleep_between_passes: std::time::Duration,
}

impl Discoverer {
    pub fn new(kv: Arc<dyn store::KvStore>, upstream: Arc<UpstreamClient>, exclude_tags: Vec<String>) -> Self {
        Self {
            kv,
            upstream,
            exclude_tags,
            sleep_between_passes: std::time::Duration::from_secs(30 * 60),
        }
    }

    /// Override the default 30-minute between-pass sleep; used by tests so
    /// a single pass can be observed without waiting.
    pub fn with_sleep_between_passes(mut self, sleep: std::time::Duration) -> Self {
        self.sleep_between_passes = sleep;
        self
    }

    /// Run forever: one pass over every monitored tag, then sleep.
    pub async fn run(&self) -> Result<(), IngestError> {
        loop {
            self.run_once().await?;
            tokio::time::sleep(self.sleep_between_passes).await;
        }
    }

    /// A single pass over every monitored tag, fanned out and joined.
    pub async fn run_once(&self) -> Result<(), IngestError> {
        let tags = self.kv.lrange(INDEXED_TAGS_KEY, 0, -1).await?;
        let tags: Vec<String> = tags
            .into_iter()
            .map(String::from_utf8)
            .collect::<Result<_, _>>()
            .map_err(store::StoreError::InvalidUtf8)?;

        let passes = tags.into_iter().map(|tag| async move {
            let result = self.refresh_tag(tag.clone()).await;
            (tag, result)
        });
        let results = futures::future::join_all(passes).await;

        // A transient upstream failure abandons only the affected tag's
        // pass; the next refresh cycle retries it. It must not abort every
        // other tag's pass in this same cycle. A store error is not ours
        // to catch — it propagates so the supervisor can restart the task.
        for (tag, result) in results {
            if let Err(err) = result {
                match err {
                    IngestError::Upstream(ref upstream_err) if upstream_err.is_transient() => {
                        tracing::warn!(tag = %tag, error = %err, "discoverer pass abandoned for tag, retrying next cycle");
                    }
                    other => return Err(other),
                }
            }
        }
        Ok(())
    }

    /// Walk a single tag's upstream history, resuming from the post id at
    /// the head of its queue.
    async fn refresh_tag(&self, tag: String) -> Result<(), IngestError> {
        let queue_key = index_queue_key(&tag);

        let last_id = match self.kv.lindex(&queue_key, 0).await? {
            Some(raw) => {
                let head: Skeleton = serde_json::from_slice(&raw)?;
                Some(head.src_id.parse::<u64>().unwrap_or(0))
            }
            None => None,
        };

        let posts = self
            .upstream
            .search(&[tag.clone()], &self.exclude_tags, None, last_id)
            .await?;

        let mut enqueued = 0u32;
        for post in posts {
            let post_id = post.id.to_string();
            let is_indexed = self
                .kv
                .sismember(&store::indexed_key("danbooru"), post_id.as_bytes())
                .await?;
            let awaiting = self
                .kv
                .sismember(&store::awaiting_index_key("danbooru"), post_id.as_bytes())
                .await?;

            if is_indexed || awaiting {
                continue;
            }

            let skeleton = Skeleton {
                src: "danbooru".to_string(),
                src_id: post_id.clone(),
                src_url: post.url,
                characters: post.characters.into_iter().collect(),
                rating: post.rating,
            };
            let serialized = serde_json::to_vec(&skeleton)?;

            self.kv.lpush(&queue_key, &serialized).await?;
            self.kv
                .sadd(&store::awaiting_index_key("danbooru"), post_id.as_bytes())
                .await?;

            enqueued += 1;
        }

        tracing::info!(tag = %tag, enqueued, "discoverer pass complete for tag");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{InMemoryKv, Rating};

    fn client() -> Arc<UpstreamClient> {
        Arc::new(UpstreamClient::new("http://example.invalid", "boorudex-test/0.1"))
    }

    #[tokio::test]
    async fn empty_tag_list_is_a_no_op() {
        let kv: Arc<dyn store::KvStore> = Arc::new(InMemoryKv::new());
        let discoverer = Discoverer::new(kv, client(), vec![]);
        discoverer.run_once().await.unwrap();
    }

    #[tokio::test]
    async fn skeleton_survives_a_queue_round_trip() {
        let kv = InMemoryKv::new();
        let queue_key = index_queue_key("touhou");
        let skeleton = Skeleton {
            src: "danbooru".to_string(),
            src_id: "100".to_string(),
            src_url: Some("https://example.invalid/a.png".to_string()),
            characters: Default::default(),
            rating: Rating::Safe,
        };
        let serialized = serde_json::to_vec(&skeleton).unwrap();
        kv.lpush(&queue_key, &serialized).await.unwrap();

        let head = kv.lindex(&queue_key, 0).await.unwrap().unwrap();
        let decoded: Skeleton = serde_json::from_slice(&head).unwrap();
        assert_eq!(decoded.src_id, "100");
    }

    /// Resuming past an already-seen head fetches only the posts a
    /// correctly-filtering upstream returns for the `id:<100` resume
    /// filter, leaving the pre-existing head and anything below it
    /// untouched.
    #[tokio::test]
    async fn resumes_discovery_past_already_seen_posts() {
        use axum::extract::Query;
        use axum::routing::get;
        use axum::Json;
        use std::collections::HashMap;

        async fn posts_handler(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
            let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
            let tags = params.get("tags").cloned().unwrap_or_default();

            let ids: &[u64] = if page == 1 && tags.contains("id:<100") {
                &[200, 150]
            } else {
                &[]
            };

            let posts: Vec<_> = ids
                .iter()
                .map(|id| {
                    serde_json::json!({
                        "id": id,
                        "rating": "s",
                        "tag_string": "touhou",
                        "tag_string_character": "reimu_hakurei",
                        "file_url": format!("https://example.invalid/{id}.png"),
                        "large_file_url": null,
                        "preview_file_url": null,
                    })
                })
                .collect();
            Json(serde_json::Value::Array(posts))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route("/posts.json", get(posts_handler));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let kv: Arc<dyn store::KvStore> = Arc::new(InMemoryKv::new());
        kv.lpush(INDEXED_TAGS_KEY, b"touhou").await.unwrap();

        let queue_key = index_queue_key("touhou");
        let existing = Skeleton {
            src: "danbooru".to_string(),
            src_id: "100".to_string(),
            src_url: Some("https://example.invalid/100.png".to_string()),
            characters: Default::default(),
            rating: Rating::Safe,
        };
        kv.lpush(&queue_key, &serde_json::to_vec(&existing).unwrap())
            .await
            .unwrap();
        kv.sadd(&store::awaiting_index_key("danbooru"), b"100")
            .await
            .unwrap();

        let upstream = Arc::new(UpstreamClient::new(format!("http://{addr}"), "boorudex-test/0.1"));
        let discoverer = Discoverer::new(kv.clone(), upstream, vec![]);
        discoverer.run_once().await.unwrap();

        let queue_after = kv.lrange(&queue_key, 0, -1).await.unwrap();
        let ids: Vec<String> = queue_after
            .iter()
            .map(|raw| serde_json::from_slice::<Skeleton>(raw).unwrap().src_id)
            .collect();
        assert_eq!(ids, vec!["150", "200", "100"]);

        let awaiting = store::awaiting_index_key("danbooru");
        assert!(kv.sismember(&awaiting, b"150").await.unwrap());
        assert!(kv.sismember(&awaiting, b"200").await.unwrap());
        assert!(!kv.sismember(&awaiting, b"50").await.unwrap());
    }
}
