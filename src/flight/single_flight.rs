use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Bounded retry for [`SingleFlight::get_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Create attempts before the last error is returned.
    pub max_attempts: u32,
    /// Pause before re-checking after a failed create.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

/// Per-key async guard. One `tokio` mutex per key, created lazily and
/// dropped again once nobody holds or waits for it.
#[derive(Debug, Default)]
pub struct SingleFlight {
    keys: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    policy: RetryPolicy,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            keys: Mutex::default(),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Keys currently held or awaited.
    pub fn in_flight(&self) -> usize {
        self.keys.lock().map(|keys| keys.len()).unwrap_or_else(|p| p.into_inner().len())
    }

    fn acquire(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        // the map only holds Arcs; a panic elsewhere cannot leave it inconsistent
        let mut keys = self.keys.lock().unwrap_or_else(|p| p.into_inner());
        keys.entry(key.to_string()).or_default().clone()
    }

    fn release(&self, key: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut keys = self.keys.lock().unwrap_or_else(|p| p.into_inner());
        // map + ours: nobody else is waiting
        if Arc::strong_count(lock) == 2 {
            keys.remove(key);
        }
    }

    /// Run `fut` while holding the guard for `key`. Dropping the returned
    /// future releases the guard, waiting or not.
    pub async fn run<F, T>(&self, key: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let slot = Slot {
            flight: self,
            key,
            lock: self.acquire(key),
        };
        let _held = slot.lock.lock().await;
        fut.await
    }

    /// Return the resource `find` locates, creating it with `create` if
    /// absent. Only one caller per key runs this at a time; after a failed
    /// create the lookup is repeated, up to `max_attempts` creates.
    pub async fn get_or_create<T, Find, FindFut, Create, CreateFut>(
        &self,
        key: &str,
        mut find: Find,
        mut create: Create,
    ) -> Result<T>
    where
        Find: FnMut() -> FindFut,
        FindFut: Future<Output = Result<Option<T>>>,
        Create: FnMut() -> CreateFut,
        CreateFut: Future<Output = Result<T>>,
    {
        let policy = self.policy;
        self.run(key, async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                if let Some(found) = find().await? {
                    return Ok(found);
                }
                match create().await {
                    Ok(created) => {
                        debug!(key, attempt, "single-flight created resource");
                        return Ok(created);
                    }
                    Err(err) if attempt < policy.max_attempts => {
                        warn!(key, attempt, error = %err, "single-flight create failed, re-checking");
                        tokio::time::sleep(Duration::from_millis(policy.backoff_ms)).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
        .await
    }
}

struct Slot<'a> {
    flight: &'a SingleFlight,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.flight.release(self.key, &self.lock);
    }
}
