use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::BenchError;

/// The store operations the load generator drives.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Insert or overwrite `key`.
    async fn put(&self, key: &str, value: &str) -> Result<(), BenchError>;

    /// Look up `key`, `None` when it is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, BenchError>;
}

#[async_trait]
impl<T> KvStore for Arc<T>
where
    T: KvStore + ?Sized,
{
    async fn put(&self, key: &str, value: &str) -> Result<(), BenchError> {
        (**self).put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BenchError> {
        (**self).get(key).await
    }
}

/// An in-process store. Backs `KvServer` and stands in for a remote one in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), BenchError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BenchError> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}
