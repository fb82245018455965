use crate::error::StoreError;
use fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Content rating, single-character on the wire as the `hash:{H}:rating`
/// scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Safe,
    Questionable,
    Explicit,
}

impl Rating {
    pub fn as_char(&self) -> char {
        match self {
            Rating::Safe => 's',
            Rating::Questionable => 'q',
            Rating::Explicit => 'e',
        }
    }
}

impl TryFrom<char> for Rating {
    type Error = StoreError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            's' => Ok(Rating::Safe),
            'q' => Ok(Rating::Questionable),
            'e' => Ok(Rating::Explicit),
            other => Err(StoreError::InvalidRating(other)),
        }
    }
}

/// One fully-resolved record, keyed by `imhash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub imhash: Fingerprint,
    pub src: String,
    pub src_id: String,
    pub src_url: Option<String>,
    pub characters: BTreeSet<String>,
    pub rating: Rating,
}

/// An `IndexEntry` with an unresolved fingerprint: produced by the
/// Discoverer, consumed by the Fetcher, serialized as JSON on
/// `index_queue:{tag}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skeleton {
    pub src: String,
    pub src_id: String,
    pub src_url: Option<String>,
    pub characters: BTreeSet<String>,
    pub rating: Rating,
}

impl Skeleton {
    /// Resolve the fingerprint once the image has been downloaded and
    /// hashed, producing the `IndexEntry` ready for `IndexStore::insert`.
    /// Modeled as a consuming transform rather than in-place mutation, per
    /// the "avoid in-place mutation" design note.
    pub fn evolve(self, imhash: Fingerprint) -> IndexEntry {
        IndexEntry {
            imhash,
            src: self.src,
            src_id: self.src_id,
            src_url: self.src_url,
            characters: self.characters,
            rating: self.rating,
        }
    }
}

