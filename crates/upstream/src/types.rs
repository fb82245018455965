use serde::Deserialize;
use store::Rating;

/// A post as returned by the upstream board, before it is narrowed down
/// to a `Skeleton`/`IndexEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPost {
    pub id: u64,
    pub rating: Rating,
    pub tags: Vec<String>,
    pub characters: Vec<String>,
    /// `None` when the post has no usable `file_url`/`large_file_url`/
    /// `preview_file_url` — the post is still returned so the caller can
    /// mark it processed and skip it.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPost {
    pub id: u64,
    pub rating: String,
    #[serde(default)]
    pub tag_string: String,
    #[serde(default)]
    pub tag_string_character: String,
    pub file_url: Option<String>,
    pub large_file_url: Option<String>,
    pub preview_file_url: Option<String>,
}

impl RawPost {
    pub(crate) fn into_post(self) -> Result<UpstreamPost, crate::error::UpstreamError> {
        let rating_char = self
            .rating
            .chars()
            .next()
            .ok_or_else(|| crate::error::UpstreamError::Malformed("empty rating".into()))?;
        let rating = Rating::try_from(rating_char)
            .map_err(|_| crate::error::UpstreamError::Malformed(format!("bad rating {rating_char:?}")))?;

        let url = self
            .file_url
            .or(self.large_file_url)
            .or(self.preview_file_url);

        Ok(UpstreamPost {
            id: self.id,
            rating,
            tags: self.tag_string.split_whitespace().map(str::to_string).collect(),
            characters: self
                .tag_string_character
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            url,
        })
    }
}

/// Result of `lookup_tag`: a partial-name tag match.
#[derive(Debug, Clone, Deserialize)]
pub struct TagDescriptor {
    pub name: String,
    #[serde(default)]
    pub post_count: u64,
    #[serde(default)]
    pub category: u32,
}
