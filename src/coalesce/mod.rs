//! Keyed request coalescing
//!
//! Concurrent callers that ask for the same key share a single execution of
//! the producer. The first caller to find no registered flight becomes the
//! leader and starts the producer; everyone else attaches to the running
//! flight and receives a clone of its outcome, success or error.
//!
//! The registry lock only covers lookup, insert and removal. The producer
//! runs on its own task, so a slow key never holds up another key, and a
//! caller that stops waiting (timeout, dropped future) cannot abort the work
//! other callers are still waiting for.

use crate::error::{HerdError, HerdResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// `None` until the producer finishes, then the shared outcome
type Outcome<V> = Option<HerdResult<V>>;

type Registry<V> = Arc<Mutex<HashMap<String, Arc<Flight<V>>>>>;

/// One outstanding producer execution for a key
struct Flight<V> {
    /// Callers currently attached, leader included
    waiters: AtomicUsize,
    done: watch::Receiver<Outcome<V>>,
}

/// Suppresses duplicate concurrent work per key
///
/// Build one per kind of operation and hand it to whatever needs coalescing;
/// clones share the same registry.
pub struct KeyedCoalescer<V> {
    flights: Registry<V>,
}

impl<V> Clone for KeyedCoalescer<V> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<V> Default for KeyedCoalescer<V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> KeyedCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty coalescer
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` for `key`, or share the outcome of the run already in flight
    ///
    /// `producer` is called at most once, and only when this caller becomes
    /// the leader. Failures are shared with every waiter but never kept: the
    /// next call after completion starts a fresh attempt.
    pub async fn run<F, Fut>(&self, key: &str, producer: F) -> HerdResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HerdResult<V>> + Send + 'static,
    {
        let (flight, rx) = self.join(key, producer);
        let _attached = Attached(flight);
        Self::wait(key, rx).await
    }

    /// Like [`run`](Self::run), but give up waiting after `timeout`
    ///
    /// Only this caller's wait is bounded. The producer keeps running and
    /// the other waiters still get its outcome.
    pub async fn run_with_timeout<F, Fut>(
        &self,
        key: &str,
        producer: F,
        timeout: Duration,
    ) -> HerdResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HerdResult<V>> + Send + 'static,
    {
        let (flight, rx) = self.join(key, producer);
        let _attached = Attached(flight);

        match tokio::time::timeout(timeout, Self::wait(key, rx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("Stopped waiting for {} after {:?}", key, timeout);
                Err(HerdError::DeadlineExceeded {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Detach the flight for `key` so the next call starts a fresh producer
    ///
    /// Callers already attached still receive the detached flight's outcome.
    pub fn forget(&self, key: &str) -> bool {
        lock(&self.flights).remove(key).is_some()
    }

    /// Number of keys with a producer currently running
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }

    /// Number of callers attached to the flight for `key`
    pub fn waiters(&self, key: &str) -> usize {
        lock(&self.flights)
            .get(key)
            .map_or(0, |flight| flight.waiters.load(Ordering::Acquire))
    }

    /// Attach to the flight for `key`, starting one if there is none
    fn join<F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> (Arc<Flight<V>>, watch::Receiver<Outcome<V>>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HerdResult<V>> + Send + 'static,
    {
        let mut flights = lock(&self.flights);

        if let Some(flight) = flights.get(key) {
            let waiters = flight.waiters.fetch_add(1, Ordering::AcqRel) + 1;
            trace!("Joined in-flight call for {} ({} waiters)", key, waiters);
            return (Arc::clone(flight), flight.done.clone());
        }

        let (tx, rx) = watch::channel(None);
        let flight = Arc::new(Flight {
            waiters: AtomicUsize::new(1),
            done: rx.clone(),
        });
        flights.insert(key.to_string(), Arc::clone(&flight));
        drop(flights);

        debug!("Leading new call for {}", key);
        // Guard first: a producer that panics before returning a future must
        // still leave the registry.
        let landing = Landing {
            flights: Arc::clone(&self.flights),
            key: key.to_string(),
            flight: Arc::clone(&flight),
        };
        let work = producer();

        tokio::spawn(async move {
            let outcome = work.await;
            // Unregister before signalling: whoever sees the outcome never finds
            // this flight. On panic the landing drops during unwind instead.
            drop(landing);
            tx.send_replace(Some(outcome));
        });

        (flight, rx)
    }

    async fn wait(key: &str, mut rx: watch::Receiver<Outcome<V>>) -> HerdResult<V> {
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };

        outcome.unwrap_or_else(|| {
            warn!("Producer for {} ended without an outcome", key);
            Err(HerdError::Abandoned {
                key: key.to_string(),
            })
        })
    }
}

/// Counts a caller as attached for as long as it waits
struct Attached<V>(Arc<Flight<V>>);

impl<V> Drop for Attached<V> {
    fn drop(&mut self) {
        self.0.waiters.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Removes a finished flight from the registry
struct Landing<V> {
    flights: Registry<V>,
    key: String,
    flight: Arc<Flight<V>>,
}

impl<V> Drop for Landing<V> {
    fn drop(&mut self) {
        let mut flights = lock(&self.flights);
        // A forgotten flight may already have been replaced by a newer one.
        if flights
            .get(&self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.flight))
        {
            flights.remove(&self.key);
        }
    }
}

fn lock<V>(flights: &Registry<V>) -> MutexGuard<'_, HashMap<String, Arc<Flight<V>>>> {
    // Nothing panics while holding the lock, but a poisoned map is still consistent.
    flights.lock().unwrap_or_else(PoisonError::into_inner)
}
