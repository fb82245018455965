use crate::error::StoreError;
use crate::keys;
use crate::kv::{Batch, KvStore};
use crate::model::{IndexEntry, Rating};
use fingerprint::Fingerprint;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Persists `IndexEntry` records, maintains the inverted byte-position
/// index, and enforces at-most-once insertion per fingerprint.
pub struct IndexStore {
    kv: Arc<dyn KvStore>,
}

impl IndexStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// `exists(imhash) -> bool`: true iff `hash:{imhash}:src` is present.
    pub async fn exists(&self, imhash: &Fingerprint) -> Result<bool, StoreError> {
        self.kv.exists(&keys::hash_key(imhash, "src")).await
    }

    /// `load(imhash) -> IndexEntry | NotFound`. Reads the scalar fields and
    /// the character set in parallel; fails with `NotFound` if the primary
    /// key is absent.
    pub async fn load(&self, imhash: &Fingerprint) -> Result<IndexEntry, StoreError> {
        let (src, src_id, src_url, rating, characters) = tokio::join!(
            self.kv.get(&keys::hash_key(imhash, "src")),
            self.kv.get(&keys::hash_key(imhash, "src_id")),
            self.kv.get(&keys::hash_key(imhash, "src_url")),
            self.kv.get(&keys::hash_key(imhash, "rating")),
            self.kv.smembers(&keys::hash_key(imhash, "characters")),
        );

        let src = src?.ok_or(StoreError::NotFound)?;
        let src = String::from_utf8(src)?;
        let src_id = src_id?.ok_or(StoreError::NotFound)?;
        let src_id = String::from_utf8(src_id)?;
        let src_url = match src_url? {
            Some(bytes) => Some(String::from_utf8(bytes)?),
            None => None,
        };
        let rating_bytes = rating?.ok_or(StoreError::NotFound)?;
        let rating_char = String::from_utf8(rating_bytes)?
            .chars()
            .next()
            .ok_or(StoreError::InvalidRating('\0'))?;
        let rating = Rating::try_from(rating_char)?;

        let characters: BTreeSet<String> = characters?
            .into_iter()
            .map(String::from_utf8)
            .collect::<Result<_, _>>()?;

        Ok(IndexEntry {
            imhash: *imhash,
            src,
            src_id,
            src_url,
            characters,
            rating,
        })
    }

    /// `insert(entry) -> (inserted, existing_src_id)`. Runs the four-step
    /// exists-check-then-atomic-batch-write protocol below, which is
    /// deliberately non-linearizable: the outer pipeline guarantees only
    /// one fetcher ever processes a given skeleton, so the race is benign
    /// (at most wasted work, never a violated invariant).
    pub async fn insert(&self, entry: &IndexEntry) -> Result<(bool, String), StoreError> {
        // Step 1: unconditionally record that this post has been seen.
        self.kv
            .sadd(&keys::indexed_key(&entry.src), entry.src_id.as_bytes())
            .await?;

        // Step 2: first-inserted-wins check.
        if let Some(existing) = self
            .kv
            .get(&keys::hash_key(&entry.imhash, "src_id"))
            .await?
        {
            return Ok((false, String::from_utf8(existing)?));
        }

        // Step 3: atomic batch write of scalars + inverted index + reverse
        // character lookups.
        let mut batch = Batch::new();
        batch.set(keys::hash_key(&entry.imhash, "src"), entry.src.as_bytes());
        batch.set(
            keys::hash_key(&entry.imhash, "src_id"),
            entry.src_id.as_bytes(),
        );
        if let Some(url) = &entry.src_url {
            batch.set(keys::hash_key(&entry.imhash, "src_url"), url.as_bytes());
        }
        batch.set(
            keys::hash_key(&entry.imhash, "rating"),
            entry.rating.as_char().to_string().into_bytes(),
        );

        for i in 0..16 {
            batch.sadd(
                keys::hash_idx_key(i, entry.imhash.byte(i)),
                entry.imhash.as_bytes().to_vec(),
            );
        }

        if !entry.characters.is_empty() {
            for character in &entry.characters {
                batch.sadd(
                    keys::hash_key(&entry.imhash, "characters"),
                    character.as_bytes(),
                );
                batch.sadd(
                    keys::character_key(character),
                    entry.imhash.as_bytes().to_vec(),
                );
            }
        }

        self.kv.exec_atomic(batch).await?;

        // Step 4.
        Ok((true, entry.src_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_kv::InMemoryKv;

    fn entry(imhash: [u8; 16], src_id: &str) -> IndexEntry {
        IndexEntry {
            imhash: Fingerprint::from_bytes(imhash),
            src: "danbooru".into(),
            src_id: src_id.into(),
            src_url: Some("https://example.invalid/1.png".into()),
            characters: BTreeSet::from(["reimu_hakurei".to_string()]),
            rating: Rating::Safe,
        }
    }

    #[tokio::test]
    async fn round_trip_preserves_entry() {
        let store = IndexStore::new(Arc::new(InMemoryKv::new()));
        let e = entry([0; 16], "1");
        let (inserted, id) = store.insert(&e).await.unwrap();
        assert!(inserted);
        assert_eq!(id, "1");

        let loaded = store.load(&e.imhash).await.unwrap();
        assert_eq!(loaded, e);
    }

    #[tokio::test]
    async fn second_insert_is_idempotent() {
        let store = IndexStore::new(Arc::new(InMemoryKv::new()));
        let e1 = entry([1; 16], "1");
        let mut e2 = entry([1; 16], "2");
        e2.characters.clear();

        store.insert(&e1).await.unwrap();
        let (inserted, existing) = store.insert(&e2).await.unwrap();
        assert!(!inserted);
        assert_eq!(existing, "1");

        let loaded = store.load(&e1.imhash).await.unwrap();
        assert_eq!(loaded.src_id, "1");
        assert!(store.kv().sismember(b"indexed:danbooru", b"2").await.unwrap());
    }

    #[tokio::test]
    async fn inverted_index_soundness() {
        let store = IndexStore::new(Arc::new(InMemoryKv::new()));
        let e = entry([7; 16], "1");
        store.insert(&e).await.unwrap();

        let keys: Vec<Vec<u8>> = (0..16)
            .map(|i| keys::hash_idx_key(i, e.imhash.byte(i)))
            .collect();
        let union = store.kv().sunion(&keys).await.unwrap();
        assert!(union.contains(&e.imhash.as_bytes().to_vec()));
    }

    #[tokio::test]
    async fn load_missing_returns_not_found() {
        let store = IndexStore::new(Arc::new(InMemoryKv::new()));
        let missing = Fingerprint::from_bytes([9; 16]);
        let err = store.load(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn exists_reflects_insertion() {
        let store = IndexStore::new(Arc::new(InMemoryKv::new()));
        let e = entry([2; 16], "1");
        assert!(!store.exists(&e.imhash).await.unwrap());
        store.insert(&e).await.unwrap();
        assert!(store.exists(&e.imhash).await.unwrap());
    }
}
