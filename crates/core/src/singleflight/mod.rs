//! Request coalescing.
//!
//! At most one call per key is in flight at any instant. Later callers for the
//! same key attach to the running call and receive a clone of its result,
//! success or error. The work runs on its own task, so a caller that gives up
//! waiting does not cancel it for the others.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;

type SharedCall<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Outcome of [`SingleFlight::run`].
#[derive(Debug, Clone)]
pub struct Joined<T, E> {
    pub result: Result<T, E>,
    /// True if this caller attached to a call started by someone else.
    pub shared: bool,
}

/// Removes a finished call from the map, also when its task panics.
struct Cleanup<K: Eq + Hash, T, E> {
    calls: Arc<Mutex<HashMap<K, SharedCall<T, E>>>>,
    key: K,
}

impl<K: Eq + Hash, T, E> Drop for Cleanup<K, T, E> {
    fn drop(&mut self) {
        let mut calls = match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.remove(&self.key);
    }
}

pub struct SingleFlight<K, T, E> {
    calls: Arc<Mutex<HashMap<K, SharedCall<T, E>>>>,
}

impl<K, T, E> Default for SingleFlight<K, T, E> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or wait for the call already in flight.
    ///
    /// `work` is only invoked by the caller that starts the call.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Joined<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (call, shared) = {
            let mut calls = match self.calls.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            if let Some(existing) = calls.get(&key) {
                (existing.clone(), true)
            } else {
                let cleanup = Cleanup {
                    calls: Arc::clone(&self.calls),
                    key: key.clone(),
                };
                let fut = work();
                // The key is inserted below while the lock is still held,
                // so the cleanup always runs after the insert.
                let handle = tokio::spawn(async move {
                    let _cleanup = cleanup;
                    fut.await
                });

                let call = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(E::from(e)),
                    }
                }
                .boxed()
                .shared();

                calls.insert(key, call.clone());
                (call, false)
            }
        };

        Joined {
            result: call.await,
            shared,
        }
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        match self.calls.lock() {
            Ok(calls) => calls.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
