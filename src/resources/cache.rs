//! Load-once cache for parsed resources.
//!
//! Every key has at most one load in flight. The first request registers a shared
//! future under the key; later requests for the same key await that future
//! instead of starting their own. A successful load is kept for the lifetime of
//! the cache, a failed load is removed again so the next request retries.
//!
//! Dropping a `get_or_load` future does not cancel the load. An unfinished load
//! whose caller stops waiting is handed to the runtime (the ambient tokio runtime
//! natively, the browser's microtask queue on wasm) and still settles into the
//! cache. Without a tokio runtime the load stays registered under its key and the
//! next request for that key picks it up where it stopped.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;

use crate::{
    errors::Result,
    resources::fetch::{MaybeSend, MaybeSync},
};

#[cfg(not(target_arch = "wasm32"))]
type LoadFuture<T> = futures::future::BoxFuture<'static, Result<Arc<T>>>;
#[cfg(target_arch = "wasm32")]
type LoadFuture<T> = futures::future::LocalBoxFuture<'static, Result<Arc<T>>>;

#[cfg(not(target_arch = "wasm32"))]
fn into_load<T, Fut>(load: Fut) -> LoadFuture<T>
where
    Fut: Future<Output = Result<Arc<T>>> + Send + 'static,
{
    load.boxed()
}

#[cfg(target_arch = "wasm32")]
fn into_load<T, Fut>(load: Fut) -> LoadFuture<T>
where
    Fut: Future<Output = Result<Arc<T>>> + 'static,
{
    load.boxed_local()
}

#[cfg(not(target_arch = "wasm32"))]
fn detach(key: &str, load: impl Future<Output = ()> + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            log::debug!("Finishing abandoned load of `{}` in the background", key);
            runtime.spawn(load);
        }
        Err(_) => {
            log::debug!("No runtime to finish `{}`, the next request resumes it", key);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn detach(key: &str, load: impl Future<Output = ()> + 'static) {
    log::debug!("Finishing abandoned load of `{}` in the background", key);
    wasm_bindgen_futures::spawn_local(load);
}

enum Slot<T> {
    Loading {
        id: u64,
        load: Shared<LoadFuture<T>>,
    },
    Ready(Arc<T>),
}

struct Inner<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    next_id: AtomicU64,
}

/// Keeps a load running when the `get_or_load` future awaiting it is dropped.
struct Detach<T: MaybeSend + MaybeSync + 'static> {
    key: String,
    load: Option<Shared<LoadFuture<T>>>,
}

impl<T: MaybeSend + MaybeSync + 'static> Drop for Detach<T> {
    fn drop(&mut self) {
        if let Some(load) = self.load.take()
            && load.peek().is_none()
        {
            detach(&self.key, load.map(|_| ()));
        }
    }
}

impl<T> Inner<T> {
    /// Records the outcome of load `id`, unless the key has been taken over since.
    fn settle(&self, key: &str, id: u64, outcome: &Result<Arc<T>>) {
        let mut slots = self.slots.lock();
        let current = matches!(
            slots.get(key),
            Some(Slot::Loading { id: current, .. }) if *current == id
        );
        if !current {
            return;
        }
        match outcome {
            Ok(value) => {
                slots.insert(key.to_string(), Slot::Ready(value.clone()));
            }
            Err(e) => {
                log::debug!("Load of `{}` failed, not caching: {}", key, e);
                slots.remove(key);
            }
        }
    }
}

/// Maps asset names to shared, immutable resources.
///
/// Cloning the cache is cheap and every clone refers to the same entries.
pub struct ResourceCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<T: MaybeSend + MaybeSync + 'static> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Returns the resource stored under `key`, loading it with `loader` if needed.
     *
     * `loader` is only called when no entry exists for `key`, and then only once the
     * returned future is first polled. Concurrent callers for the same key share one
     * load and receive the same result, including the same error. Dropping the
     * returned future after the load started lets the load finish on its own.
     */
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut + MaybeSend + 'static,
        Fut: Future<Output = Result<T>> + MaybeSend + 'static,
    {
        let load = {
            let mut slots = self.inner.slots.lock();
            match slots.get(key) {
                Some(Slot::Ready(value)) => {
                    log::debug!("Cache hit for `{}`", key);
                    return Ok(value.clone());
                }
                Some(Slot::Loading { load, .. }) => {
                    log::debug!("Joining in-flight load of `{}`", key);
                    load.clone()
                }
                None => {
                    log::debug!("Cache miss for `{}`", key);
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let cache: Weak<Inner<T>> = Arc::downgrade(&self.inner);
                    let owned_key = key.to_string();
                    let load = into_load(async move {
                        let outcome = loader().await.map(Arc::new);
                        if let Some(cache) = cache.upgrade() {
                            cache.settle(&owned_key, id, &outcome);
                        }
                        outcome
                    })
                    .shared();
                    slots.insert(
                        key.to_string(),
                        Slot::Loading {
                            id,
                            load: load.clone(),
                        },
                    );
                    load
                }
            }
        };
        let mut guard = Detach {
            key: key.to_string(),
            load: Some(load.clone()),
        };
        let outcome = load.await;
        guard.load = None;
        outcome
    }

    /// The resource under `key` if it has finished loading.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        match self.inner.slots.lock().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Whether `key` is loaded or being loaded.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.slots.lock().contains_key(key)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        matches!(
            self.inner.slots.lock().get(key),
            Some(Slot::Loading { .. })
        )
    }

    /// Stores an already constructed resource, replacing whatever was under `key`.
    pub fn insert(&self, key: impl Into<String>, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.inner
            .slots
            .lock()
            .insert(key.into(), Slot::Ready(value.clone()));
        value
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.slots.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}
