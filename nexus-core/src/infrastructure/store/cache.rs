use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Keyed cache whose entries are reloaded once older than the caller's TTL.
///
/// The lock is never held across the loader, so two callers may load the
/// same key concurrently; the later result replaces the earlier one.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_load<F, Fut, E>(&self, key: &str, ttl: Duration, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.fresh(key, ttl) {
            return Ok(value);
        }
        let value = loader().await?;
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now(), value.clone()));
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        let (loaded_at, value) = entries.get(key)?;
        (loaded_at.elapsed() < ttl).then(|| value.clone())
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
