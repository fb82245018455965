//! In-memory [`KvStore`] backed by a single `RwLock`-guarded map. Used by
//! the test suite so `IndexStore`/`Searcher`/Discoverer/Fetcher logic is
//! exercised without a running Redis instance.

use crate::error::StoreError;
use crate::kv::{Batch, KvStore, WriteCmd};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

#[derive(Clone)]
enum Value {
    Str(Vec<u8>),
    Set(HashSet<Vec<u8>>),
    List(VecDeque<Vec<u8>>),
}

#[derive(Default)]
pub struct InMemoryKv {
    data: RwLock<HashMap<Vec<u8>, Value>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_inner(data: &mut HashMap<Vec<u8>, Value>, key: &[u8], value: &[u8]) {
        data.insert(key.to_vec(), Value::Str(value.to_vec()));
    }

    fn sadd_inner(data: &mut HashMap<Vec<u8>, Value>, key: &[u8], member: &[u8]) {
        match data.entry(key.to_vec()).or_insert_with(|| Value::Set(HashSet::new())) {
            Value::Set(set) => {
                set.insert(member.to_vec());
            }
            other => *other = {
                let mut set = HashSet::new();
                set.insert(member.to_vec());
                Value::Set(set)
            },
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(match data.get(key) {
            Some(Value::Str(v)) => Some(v.clone()),
            _ => None,
        })
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        Self::set_inner(&mut data, key, value);
        Ok(())
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(data.contains_key(key))
    }

    async fn sadd(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        Self::sadd_inner(&mut data, key, member);
        Ok(())
    }

    async fn srem(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        if let Some(Value::Set(set)) = data.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(match data.get(key) {
            Some(Value::Set(set)) => set.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(match data.get(key) {
            Some(Value::Set(set)) => set.contains(member),
            _ => false,
        })
    }

    async fn scard(&self, key: &[u8]) -> Result<u64, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(match data.get(key) {
            Some(Value::Set(set)) => set.len() as u64,
            _ => 0,
        })
    }

    async fn sunion(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut union: HashSet<Vec<u8>> = HashSet::new();
        for key in keys {
            if let Some(Value::Set(set)) = data.get(key.as_slice()) {
                union.extend(set.iter().cloned());
            }
        }
        Ok(union.into_iter().collect())
    }

    async fn lpush(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        match data.entry(key.to_vec()).or_insert_with(|| Value::List(VecDeque::new())) {
            Value::List(list) => list.push_front(value.to_vec()),
            other => *other = {
                let mut list = VecDeque::new();
                list.push_front(value.to_vec());
                Value::List(list)
            },
        }
        Ok(())
    }

    async fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(match data.get_mut(key) {
            Some(Value::List(list)) => list.pop_back(),
            _ => None,
        })
    }

    async fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let list = match data.get(key) {
            Some(Value::List(list)) => list,
            _ => return Ok(Vec::new()),
        };
        let len = list.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let norm = |i: i64| -> i64 {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len - 1).max(0)
            }
        };
        let start = norm(start);
        let stop = norm(stop);
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    async fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let list = match data.get(key) {
            Some(Value::List(list)) => list,
            _ => return Ok(None),
        };
        let len = list.len() as i64;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return Ok(None);
        }
        Ok(list.get(idx as usize).cloned())
    }

    async fn llen(&self, key: &[u8]) -> Result<u64, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(match data.get(key) {
            Some(Value::List(list)) => list.len() as u64,
            _ => 0,
        })
    }

    async fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        if let Some(Value::List(list)) = data.get_mut(key) {
            if count == 0 {
                list.retain(|v| v != value);
            } else if count > 0 {
                let mut remaining = count;
                list.retain(|v| {
                    if remaining > 0 && v == value {
                        remaining -= 1;
                        false
                    } else {
                        true
                    }
                });
            } else {
                let mut remaining = -count;
                let mut kept: VecDeque<Vec<u8>> = VecDeque::with_capacity(list.len());
                for v in list.iter().rev() {
                    if remaining > 0 && v == value {
                        remaining -= 1;
                    } else {
                        kept.push_front(v.clone());
                    }
                }
                *list = kept;
            }
        }
        Ok(())
    }

    async fn exec_atomic(&self, batch: Batch) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        for cmd in batch.commands() {
            match cmd {
                WriteCmd::Set { key, value } => Self::set_inner(&mut data, key, value),
                WriteCmd::Sadd { key, member } => Self::sadd_inner(&mut data, key, member),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_round_trip() {
        let kv = InMemoryKv::new();
        kv.set(b"k", b"v").await.unwrap();
        assert_eq!(kv.get(b"k").await.unwrap(), Some(b"v".to_vec()));
        assert!(kv.exists(b"k").await.unwrap());
        assert!(!kv.exists(b"missing").await.unwrap());
    }

    #[tokio::test]
    async fn sadd_smembers_sunion() {
        let kv = InMemoryKv::new();
        kv.sadd(b"a", b"1").await.unwrap();
        kv.sadd(b"a", b"2").await.unwrap();
        kv.sadd(b"b", b"2").await.unwrap();
        kv.sadd(b"b", b"3").await.unwrap();
        let mut union = kv
            .sunion(&[b"a".to_vec(), b"b".to_vec()])
            .await
            .unwrap();
        union.sort();
        assert_eq!(union, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
        assert!(kv.sismember(b"a", b"1").await.unwrap());
        assert!(!kv.sismember(b"a", b"3").await.unwrap());
        assert_eq!(kv.scard(b"a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lpush_rpop_is_fifo() {
        let kv = InMemoryKv::new();
        kv.lpush(b"q", b"1").await.unwrap();
        kv.lpush(b"q", b"2").await.unwrap();
        kv.lpush(b"q", b"3").await.unwrap();
        // head (LINDEX 0) is the most recently pushed item.
        assert_eq!(kv.lindex(b"q", 0).await.unwrap(), Some(b"3".to_vec()));
        // tail (RPOP) drains oldest-first: FIFO.
        assert_eq!(kv.rpop(b"q").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(kv.rpop(b"q").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(kv.rpop(b"q").await.unwrap(), Some(b"3".to_vec()));
        assert_eq!(kv.rpop(b"q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn exec_atomic_applies_all_commands() {
        let kv = InMemoryKv::new();
        let mut batch = Batch::new();
        batch.set(b"x".to_vec(), b"1".to_vec());
        batch.sadd(b"s".to_vec(), b"m".to_vec());
        kv.exec_atomic(batch).await.unwrap();
        assert_eq!(kv.get(b"x").await.unwrap(), Some(b"1".to_vec()));
        assert!(kv.sismember(b"s", b"m").await.unwrap());
    }
}
