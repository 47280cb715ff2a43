use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, trace};

use crate::error::SharedError;
use crate::types::{Key, Options};

#[derive(Debug)]
enum Status<T, E> {
    Starting,
    LeaderDrop,
    Done(Result<T, E>),
}

/// One in-flight call. The status moves out of `Starting` exactly once.
struct Call<T, E> {
    status: Mutex<Status<T, E>>,
    cvar: Condvar,
}

impl<T, E> Call<T, E> {
    fn new() -> Self {
        Call {
            status: Mutex::new(Status::Starting),
            cvar: Condvar::new(),
        }
    }

    fn finish(&self, status: Status<T, E>) {
        *self.status.lock() = status;
        self.cvar.notify_all();
    }
}

enum Role<T, E> {
    Leader(Arc<Call<T, E>>),
    Follower(Result<T, E>),
}

type Calls<T, E> = Mutex<HashMap<Key, Arc<Call<T, E>>>>;

/// Group represents a class of work and creates a space in which units of work
/// can be executed with duplicate suppression.
///
/// Clones share one registry. Groups created separately never see each
/// other's calls.
pub struct Group<T, E = SharedError> {
    name: Arc<str>,
    calls: Arc<Calls<T, E>>,
}

impl<T, E> Clone for Group<T, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            calls: self.calls.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Group<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T, E> Default for Group<T, E> {
    fn default() -> Self {
        Group::new()
    }
}

impl<T, E> Group<T, E> {
    pub fn new() -> Group<T, E> {
        Group::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Group<T, E> {
        Group {
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

    // Only the leader that inserted an entry ever removes it.
    fn remove(&self, key: &str) {
        self.calls.lock().remove(key);
        trace!("Entry removed");
    }
}

impl<T, E> Group<T, E>
where
    T: Clone,
    E: Clone,
{
    /// work executes and returns the results of the given function, making
    /// sure that only one execution is in-flight for a given key at a
    /// time. If a duplicate comes in, the duplicate caller waits for the
    /// original to complete and receives the same results.
    #[instrument(skip(self, work), fields(group = %self.name))]
    pub fn work<F>(&self, key: &str, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.run(key, work).0
    }

    /// work_ex is like work but also reports whether the result is fresh:
    /// true when this caller executed the function, false when it received
    /// the result of another caller's execution.
    #[instrument(skip(self, work), fields(group = %self.name))]
    pub fn work_ex<F>(&self, key: &str, work: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.run(key, work)
    }

    fn run<F>(&self, key: &str, work: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Result<T, E>,
    {
        let call = match self.join(key) {
            Role::Follower(result) => return (result, false),
            Role::Leader(call) => call,
        };
        let flight = Flight {
            group: self,
            key,
            call,
            landed: false,
        };

        trace!("working...");
        let result = work();
        flight.land(&result);
        trace!("Work done");
        (result, true)
    }

    /// join registers the caller as leader for key, or blocks until the
    /// current leader lands and returns its result. A follower whose leader
    /// unwound without a result starts over.
    fn join(&self, key: &str) -> Role<T, E> {
        loop {
            let mut calls = self.calls.lock();
            let call = match calls.get(key) {
                Some(call) => call.clone(),
                None => {
                    let call = Arc::new(Call::new());
                    calls.insert(Key::from(key), call.clone());
                    trace!("Leader");
                    return Role::Leader(call);
                }
            };
            drop(calls);

            trace!("Not return, waiting...");
            let mut status = call.status.lock();
            while let Status::Starting = *status {
                call.cvar.wait(&mut status);
            }
            if let Status::Done(result) = &*status {
                trace!("Value returned");
                return Role::Follower(result.clone());
            }
            trace!("Leader dropped");
        }
    }
}

/// Flight owns a leader's registry entry until the result lands. If the
/// leader unwinds first, dropping the flight releases the followers.
struct Flight<'a, T, E> {
    group: &'a Group<T, E>,
    key: &'a str,
    call: Arc<Call<T, E>>,
    landed: bool,
}

impl<T, E> Flight<'_, T, E>
where
    T: Clone,
    E: Clone,
{
    fn land(mut self, result: &Result<T, E>) {
        let status = Status::Done(result.clone());
        self.group.remove(self.key);
        self.landed = true;
        self.call.finish(status);
    }
}

impl<T, E> Drop for Flight<'_, T, E> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        trace!("Leader drop");
        self.group.remove(self.key);
        self.call.finish(Status::LeaderDrop);
    }
}
