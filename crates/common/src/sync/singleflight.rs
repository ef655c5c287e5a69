//! Keyed request collapsing
//!
//! Callers that ask for the same key while a call is in flight wait for that
//! call and receive a clone of its result. Once the call completes the key is
//! released, so the next caller starts a fresh execution.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// Keyed single-flight group
///
/// # Example
/// ```
/// use conduit_common::sync::SingleFlight;
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let group: SingleFlight<String, u32> = SingleFlight::new();
/// let value = group.work("key".to_string(), || async { 42 }).await;
/// assert_eq!(value, 42);
/// # });
/// ```
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self { calls: Mutex::new(HashMap::new()) }
    }

    /// Run `work` unless a call for `key` is already running, in which case
    /// wait for it and share its result.
    pub async fn work<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut calls = self.calls.lock();
            Arc::clone(calls.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())))
        };

        let value = cell.get_or_init(work).await.clone();

        let mut calls = self.calls.lock();
        if calls.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            calls.remove(&key);
        }

        value
    }

    /// Number of keys with a call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
