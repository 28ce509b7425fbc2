use tracing::{debug, info};

use crate::{
    error::BenchError,
    retry::{retry, RetryStrategy},
    store::KvStore,
    workload::{key_for, population_value},
};

/// Write the whole key space into `store`, one key at a time.
///
/// Runs sequentially on the calling task and stops at the first put the
/// retry strategy gives up on. Running it again rewrites the same values.
pub async fn populate<S>(
    store: &S,
    size: usize,
    retry_strategy: &dyn RetryStrategy,
) -> Result<(), BenchError>
where
    S: KvStore + ?Sized,
{
    info!("Populating store with {} values...", size);
    for i in 0..size {
        let key = key_for(i);
        let value = population_value(i);
        retry(retry_strategy, "populate put", || store.put(&key, &value)).await?;
        if i > 0 && i % 100_000 == 0 {
            debug!("Populated {} of {} keys", i, size);
        }
    }
    info!("Done populating kv store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{retry::FailFast, store::MemoryStore};

    #[tokio::test]
    async fn test_populate_fills_key_space() {
        let store = MemoryStore::new();
        populate(&store, 100, &FailFast).await.unwrap();
        assert_eq!(store.len().await, 100);
        assert_eq!(
            store.get("keykeykey0").await.unwrap(),
            Some("this is a test value 0".to_string())
        );
        assert_eq!(
            store.get("keykeykey99").await.unwrap(),
            Some("this is a test value 99".to_string())
        );
    }

    #[tokio::test]
    async fn test_populate_is_idempotent() {
        let once = MemoryStore::new();
        populate(&once, 50, &FailFast).await.unwrap();

        let twice = MemoryStore::new();
        populate(&twice, 50, &FailFast).await.unwrap();
        populate(&twice, 50, &FailFast).await.unwrap();

        assert_eq!(once.snapshot().await, twice.snapshot().await);
    }

    /// Fails every put after the first `ok_puts`.
    struct BrokenStore {
        ok_puts: usize,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn put(&self, _key: &str, _value: &str) -> Result<(), BenchError> {
            if self.puts.fetch_add(1, Ordering::SeqCst) < self.ok_puts {
                Ok(())
            } else {
                Err(BenchError::Store("disk full".to_string()))
            }
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, BenchError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_populate_stops_on_first_failure() {
        let store = BrokenStore {
            ok_puts: 5,
            puts: AtomicUsize::new(0),
        };
        let err = populate(&store, 10, &FailFast).await.unwrap_err();
        assert_eq!(err, BenchError::Store("disk full".to_string()));
        assert_eq!(store.puts.load(Ordering::SeqCst), 6);
    }
}
