use core::future::Future;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{instrument, trace};

use crate::error::SharedError;
use crate::types::{Key, Options};

// None until the leader lands. A sender dropped while still None means
// the leader future was cancelled or panicked.
type Slot<T, E> = Option<Result<T, E>>;

type Calls<T, E> = Mutex<HashMap<Key, watch::Receiver<Slot<T, E>>>>;

enum Role<T, E> {
    Leader(watch::Sender<Slot<T, E>>),
    Follower(Result<T, E>),
}

/// AsyncGroup is the task-based counterpart of [`Group`](crate::Group).
/// Followers suspend on the leader's completion instead of blocking a
/// thread, and the registry lock is never held across an `.await`.
pub struct AsyncGroup<T, E = SharedError> {
    name: Arc<str>,
    calls: Arc<Calls<T, E>>,
}

impl<T, E> Clone for AsyncGroup<T, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            calls: self.calls.clone(),
        }
    }
}

impl<T, E> fmt::Debug for AsyncGroup<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncGroup")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T, E> Default for AsyncGroup<T, E> {
    fn default() -> Self {
        AsyncGroup::new()
    }
}

impl<T, E> AsyncGroup<T, E> {
    pub fn new() -> AsyncGroup<T, E> {
        AsyncGroup::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> AsyncGroup<T, E> {
        AsyncGroup {
            name: Arc::from(options.name),
            calls: Arc::new(Mutex::new(HashMap::with_capacity(options.capacity))),
        }
    }

    /// is_in_flight reports whether a call for key is currently executing.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.calls.lock().contains_key(key)
    }

    /// len returns the number of keys currently in flight.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    fn remove(&self, key: &str) {
        self.calls.lock().remove(key);
        trace!("Entry removed");
    }
}

impl<T, E> AsyncGroup<T, E>
where
    T: Clone,
    E: Clone,
{
    /// async_work is like [`Group::work`](crate::Group::work) but awaits the
    /// given future instead of calling a function. Only the leader's future
    /// is polled; a follower's future is dropped unpolled.
    #[instrument(skip(self, fut), fields(group = %self.name))]
    pub async fn work(&self, key: &str, fut: impl Future<Output = Result<T, E>>) -> Result<T, E> {
        self.run(key, fut).await.0
    }

    /// work_ex is like work but also reports whether the result is fresh.
    #[instrument(skip(self, fut), fields(group = %self.name))]
    pub async fn work_ex(
        &self,
        key: &str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> (Result<T, E>, bool) {
        self.run(key, fut).await
    }

    async fn run(
        &self,
        key: &str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> (Result<T, E>, bool) {
        let tx = match self.join(key).await {
            Role::Follower(result) => return (result, false),
            Role::Leader(tx) => tx,
        };
        let flight = Flight {
            group: self,
            key,
            tx: Some(tx),
        };

        trace!("working...");
        let result = fut.await;
        flight.land(&result);
        trace!("Work done");
        (result, true)
    }

    async fn join(&self, key: &str) -> Role<T, E> {
        loop {
            let mut rx = {
                let mut calls = self.calls.lock();
                match calls.get(key) {
                    Some(rx) => rx.clone(),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        calls.insert(Key::from(key), rx);
                        trace!("Leader");
                        return Role::Leader(tx);
                    }
                }
            };

            trace!("Not return, waiting...");
            match rx.wait_for(Option::is_some).await {
                Ok(slot) => {
                    if let Some(result) = &*slot {
                        trace!("Value returned");
                        return Role::Follower(result.clone());
                    }
                }
                Err(_) => trace!("Leader dropped"),
            };
        }
    }
}

/// Flight owns a leader's registry entry and the sending half of its
/// completion channel. Dropping it before landing closes the channel,
/// which sends the followers back to join.
struct Flight<'a, T, E> {
    group: &'a AsyncGroup<T, E>,
    key: &'a str,
    tx: Option<watch::Sender<Slot<T, E>>>,
}

impl<T, E> Flight<'_, T, E>
where
    T: Clone,
    E: Clone,
{
    fn land(mut self, result: &Result<T, E>) {
        let slot = Some(result.clone());
        self.group.remove(self.key);
        if let Some(tx) = self.tx.take() {
            tx.send_replace(slot);
        }
    }
}

impl<T, E> Drop for Flight<'_, T, E> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            trace!("Leader drop");
            self.group.remove(self.key);
            drop(tx);
        }
    }
}
