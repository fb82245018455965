use crate::error::UpstreamError;
use crate::retry::{execute_with_retry_async, RetryConfig};
use crate::types::{RawPost, TagDescriptor, UpstreamPost};
use futures::StreamExt;
use image::DynamicImage;
use std::time::Duration;
use store::Rating;

/// Pacing sleep issued before every page fetch.
const PAGE_PACING: Duration = Duration::from_millis(500);

/// Page counter bound, guarding against an unbounded crawl.
const DEFAULT_MAX_PAGES: u32 = 1000;

/// Posts per page.
const PAGE_LIMIT: u32 = 200;

/// Danbooru-compatible upstream client.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
    retry_config: RetryConfig,
    max_pages: u32,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            retry_config: RetryConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// `GET /posts/{id}.json`.
    pub async fn get_post(&self, post_id: u64) -> Result<UpstreamPost, UpstreamError> {
        let url = format!("{}/posts/{post_id}.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let raw: RawPost = response.json().await?;
        raw.into_post()
    }

    /// `GET /tags.json?search[name_matches]=*{sub}*`.
    pub async fn lookup_tag(&self, substring: &str) -> Result<Vec<TagDescriptor>, UpstreamError> {
        let url = format!("{}/tags.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[("search[name_matches]", format!("*{substring}*"))])
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Paginated tag search with client-side `without_tags`/`rating`
    /// post-filtering.
    ///
    /// Collects the full walk into a `Vec` rather than a lazy stream: page
    /// count is bounded at `max_pages` and each page is at most 200 posts,
    /// so eager collection is bounded and avoids the lifetime overhead of
    /// a boxed stream for a caller (`Discoverer`) that consumes every
    /// yielded post before doing anything else anyway.
    pub async fn search(
        &self,
        with_tags: &[String],
        without_tags: &[String],
        rating: Option<Rating>,
        start_id: Option<u64>,
    ) -> Result<Vec<UpstreamPost>, UpstreamError> {
        let tag_params = build_tag_params(with_tags, start_id)?;
        let tags_query = tag_params.join(" ");

        let mut results = Vec::new();
        let mut page: u32 = 1;

        while page <= self.max_pages {
            tokio::time::sleep(PAGE_PACING).await;

            let tags_query = tags_query.clone();
            let attempt = execute_with_retry_async(&self.retry_config, |_attempt| {
                let tags_query = tags_query.clone();
                async move { self.fetch_page(page, &tags_query).await.map_err(|e| e.to_string()) }
            })
            .await;

            let raw_posts = match attempt.into_result() {
                Ok(posts) => posts,
                Err(reason) => return Err(UpstreamError::Transient(reason)),
            };

            if raw_posts.is_empty() {
                break;
            }

            let posts = raw_posts
                .into_iter()
                .map(RawPost::into_post)
                .collect::<Result<Vec<_>, _>>()?;

            for post in posts {
                if let Some(wanted) = rating {
                    if post.rating != wanted {
                        continue;
                    }
                }
                if without_tags.iter().any(|excluded| post.tags.contains(excluded)) {
                    continue;
                }
                results.push(post);
            }

            page += 1;
        }

        Ok(results)
    }

    async fn fetch_page(&self, page: u32, tags_query: &str) -> Result<Vec<RawPost>, UpstreamError> {
        let url = format!("{}/posts.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[("page", page.to_string()), ("limit", PAGE_LIMIT.to_string())])
            .query(&[("tags", tags_query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Transient(format!(
                "http {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response.json().await?;
        match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)
                .map_err(|e| UpstreamError::Malformed(e.to_string())),
            _ => Err(UpstreamError::Transient("non-list response".into())),
        }
    }

    /// Stream the image at `url` into memory in 8 KiB chunks and decode it.
    pub async fn fetch_image(&self, url: &str) -> Result<DynamicImage, UpstreamError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::ImageFetch(format!(
                "http {}",
                response.status()
            )));
        }

        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpstreamError::ImageFetch(e.to_string()))?;
            buffer.extend_from_slice(&chunk);
        }

        Ok(image::load_from_memory(&buffer)?)
    }
}

/// Build the upstream `tags` query parameter. At most 2 tags are
/// supported; when `start_id` is given, an `id:<start_id` filter is
/// appended, displacing the second tag if two are already present.
fn build_tag_params(tags: &[String], start_id: Option<u64>) -> Result<Vec<String>, UpstreamError> {
    if tags.len() > 2 {
        return Err(UpstreamError::InvalidArgument(tags.len()));
    }

    let mut params = tags.to_vec();
    if let Some(id) = start_id {
        if params.len() == 2 {
            params.truncate(1);
        }
        params.push(format!("id:<{id}"));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tag_params_rejects_more_than_two_tags() {
        let tags = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = build_tag_params(&tags, None).unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidArgument(3)));
    }

    #[test]
    fn build_tag_params_appends_id_filter() {
        let tags = vec!["touhou".to_string()];
        let params = build_tag_params(&tags, Some(100)).unwrap();
        assert_eq!(params, vec!["touhou".to_string(), "id:<100".to_string()]);
    }

    #[test]
    fn build_tag_params_displaces_second_tag_for_id_filter() {
        let tags = vec!["touhou".to_string(), "reimu".to_string()];
        let params = build_tag_params(&tags, Some(100)).unwrap();
        assert_eq!(params, vec!["touhou".to_string(), "id:<100".to_string()]);
    }
}
