//! Redis-backed [`KvStore`]. Grounded in the synchronous `RedisBackend`
//! pattern (connection-lazily-established-behind-a-mutex, namespaced
//! keys, `redis::pipe()` for batched writes) but built on the async
//! multiplexed connection since Discoverer/Fetcher/Server are all tokio
//! tasks and none of them can afford to block on a blocking Redis call.

use crate::error::StoreError;
use crate::kv::{Batch, KvStore, WriteCmd};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

pub struct RedisKv {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisKv {
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::backend)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .conn
            .get_or_try_init(|| async {
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(StoreError::backend)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(StoreError::backend)
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.set(key, value).await.map_err(StoreError::backend)
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(StoreError::backend)
    }

    async fn sadd(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.sadd(key, member).await.map_err(StoreError::backend)
    }

    async fn srem(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.srem(key, member).await.map_err(StoreError::backend)
    }

    async fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.smembers(key).await.map_err(StoreError::backend)
    }

    async fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        conn.sismember(key, member).await.map_err(StoreError::backend)
    }

    async fn scard(&self, key: &[u8]) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        conn.scard(key).await.map_err(StoreError::backend)
    }

    async fn sunion(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.sunion(keys).await.map_err(StoreError::backend)
    }

    async fn lpush(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.lpush(key, value).await.map_err(StoreError::backend)
    }

    async fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.rpop(key, None).await.map_err(StoreError::backend)
    }

    async fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.lrange(key, start as isize, stop as isize)
            .await
            .map_err(StoreError::backend)
    }

    async fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.lindex(key, index as isize)
            .await
            .map_err(StoreError::backend)
    }

    async fn llen(&self, key: &[u8]) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        conn.llen(key).await.map_err(StoreError::backend)
    }

    async fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.lrem(key, count as isize, value)
            .await
            .map_err(StoreError::backend)
    }

    async fn exec_atomic(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for cmd in batch.commands() {
            match cmd {
                WriteCmd::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value).ignore();
                }
                WriteCmd::Sadd { key, member } => {
                    pipe.cmd("SADD").arg(key).arg(member).ignore();
                }
            }
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::backend)
    }
}
