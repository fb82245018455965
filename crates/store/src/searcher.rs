use crate::error::StoreError;
use crate::index_store::IndexStore;
use crate::keys;
use fingerprint::Fingerprint;

/// `threshold` default of 64 — effectively no filtering at 128 bits (half
/// the maximum distance). Callers interested in strong matches use
/// smaller values.
pub const DEFAULT_THRESHOLD: u32 = 64;

/// Candidate retrieval via byte-position set union, ranked by ascending
/// Hamming distance.
pub struct Searcher<'a> {
    store: &'a IndexStore,
}

impl<'a> Searcher<'a> {
    pub fn new(store: &'a IndexStore) -> Self {
        Self { store }
    }

    pub async fn search(
        &self,
        query: &Fingerprint,
        threshold: u32,
    ) -> Result<Vec<(Fingerprint, u32)>, StoreError> {
        let index_keys: Vec<Vec<u8>> = (0..16)
            .map(|i| keys::hash_idx_key(i, query.byte(i)))
            .collect();

        let candidates = self.store.kv().sunion(&index_keys).await?;

        let mut scored: Vec<(Fingerprint, u32)> = candidates
            .into_iter()
            .filter_map(|bytes| {
                let arr: [u8; 16] = bytes.try_into().ok()?;
                let fp = Fingerprint::from_bytes(arr);
                let distance = fp.hamming(query);
                (distance < threshold).then_some((fp, distance))
            })
            .collect();

        // Ascending distance, ties broken lexicographically by imhash —
        // stable and deterministic.
        scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_bytes().cmp(b.0.as_bytes())));

        Ok(scored)
    }

    pub async fn search_default(
        &self,
        query: &Fingerprint,
    ) -> Result<Vec<(Fingerprint, u32)>, StoreError> {
        self.search(query, DEFAULT_THRESHOLD).await
    }
}
