use crate::error::StoreError;
use async_trait::async_trait;

/// A single write issued as part of an atomic batch. `IndexStore::insert`
/// is the only caller that needs atomicity across several commands; reads
/// and single-command writes go through [`KvStore`] directly.
#[derive(Debug, Clone)]
pub enum WriteCmd {
    Set { key: Vec<u8>, value: Vec<u8> },
    Sadd { key: Vec<u8>, member: Vec<u8> },
}

/// A sequence of writes executed as one atomic unit (a Redis MULTI/EXEC
/// transaction). Built with the `set`/`sadd` helpers and handed to
/// [`KvStore::exec_atomic`].
#[derive(Debug, Clone, Default)]
pub struct Batch(Vec<WriteCmd>);

impl Batch {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.0.push(WriteCmd::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn sadd(&mut self, key: impl Into<Vec<u8>>, member: impl Into<Vec<u8>>) -> &mut Self {
        self.0.push(WriteCmd::Sadd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn commands(&self) -> &[WriteCmd] {
        &self.0
    }
}

/// The command surface the KV store is assumed to expose: GET, SET,
/// EXISTS, SADD, SREM, SMEMBERS, SCARD, SUNION, SISMEMBER, LRANGE, LPUSH,
/// RPOP, LINDEX, LREM, LLEN, plus an atomic multi-command batch.
/// Keys and values are 8-bit clean byte strings, never required to be
/// valid UTF-8, since fingerprint bytes are embedded directly in keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    async fn exists(&self, key: &[u8]) -> Result<bool, StoreError>;

    async fn sadd(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError>;
    async fn srem(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError>;
    async fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError>;
    async fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, StoreError>;
    async fn scard(&self, key: &[u8]) -> Result<u64, StoreError>;
    async fn sunion(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, StoreError>;

    async fn lpush(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    async fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    async fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError>;
    async fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>, StoreError>;
    async fn llen(&self, key: &[u8]) -> Result<u64, StoreError>;
    async fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<(), StoreError>;

    /// Execute every command in `batch` as a single atomic unit.
    async fn exec_atomic(&self, batch: Batch) -> Result<(), StoreError>;
}
