//! Backend-agnostic key-value index store.
//!
//! Persists one [`IndexEntry`] per unique perceptual fingerprint, maintains
//! the 16-way inverted byte-position index that makes approximate Hamming
//! search sub-linear, and enforces at-most-once insertion against a shared
//! KV store. See [`IndexStore`] and [`Searcher`].
//!
//! ```
//! use store::{IndexEntry, IndexStore, InMemoryKv, Rating, Searcher};
//! use fingerprint::Fingerprint;
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let kv = Arc::new(InMemoryKv::new());
//! let index = IndexStore::new(kv);
//! let entry = IndexEntry {
//!     imhash: Fingerprint::from_bytes([0; 16]),
//!     src: "danbooru".into(),
//!     src_id: "1".into(),
//!     src_url: None,
//!     characters: BTreeSet::new(),
//!     rating: Rating::Safe,
//! };
//! let (inserted, _) = index.insert(&entry).await.unwrap();
//! assert!(inserted);
//!
//! let searcher = Searcher::new(&index);
//! let hits = searcher.search_default(&entry.imhash).await.unwrap();
//! assert_eq!(hits[0].1, 0);
//! # }
//! ```

mod error;
mod index_store;
mod keys;
mod kv;
mod memory_kv;
mod model;
mod redis_kv;
mod searcher;

pub use error::StoreError;
pub use index_store::IndexStore;
pub use keys::{
    awaiting_index_key, character_key, hash_idx_key, hash_key, index_queue_key, indexed_key,
    INDEXED_TAGS_KEY,
};
pub use kv::{Batch, KvStore, WriteCmd};
pub use memory_kv::InMemoryKv;
pub use model::{IndexEntry, Rating, Skeleton};
pub use redis_kv::RedisKv;
pub use searcher::{Searcher, DEFAULT_THRESHOLD};

pub use fingerprint::Fingerprint;
