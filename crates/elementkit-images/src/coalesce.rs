//! Single-flight registry for fetches.
//!
//! The first caller for a flight becomes its leader and performs the work.
//! Callers arriving while the leader runs subscribe to a broadcast channel
//! and receive the same outcome. The flight is removed from the registry
//! before its outcome is sent, so later callers start a fresh fetch.

use std::{collections::HashMap, hash::Hash};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Counters for coalescing effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total registrations
    pub total_requests: u64,
    /// Registrations that joined a running flight
    pub coalesced_requests: u64,
    /// Registrations that started a flight
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

struct Registry<K, V> {
    in_flight: HashMap<K, broadcast::Sender<V>>,
    stats: CoalescerStats,
}

/// Tracks in-flight work keyed by `K` whose outcome is `V`.
pub(crate) struct Coalescer<K, V> {
    registry: Mutex<Registry<K, V>>,
}

/// Outcome of [`Coalescer::register`].
pub(crate) enum Registration<'a, K: Eq + Hash + Clone, V: Clone> {
    /// Caller must do the work and hand the result to the guard
    Leader(FlightGuard<'a, K, V>),
    /// Caller should wait for the leader's result
    Waiter(broadcast::Receiver<V>),
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                in_flight: HashMap::new(),
                stats: CoalescerStats::default(),
            }),
        }
    }

    pub(crate) fn register(&self, key: &K) -> Registration<'_, K, V> {
        let mut registry = self.registry.lock();
        registry.stats.total_requests += 1;

        if let Some(tx) = registry.in_flight.get(key) {
            let rx = tx.subscribe();
            registry.stats.coalesced_requests += 1;
            debug!(key = ?key, "Joining in-flight fetch");
            return Registration::Waiter(rx);
        }

        // One message per flight
        let (tx, _rx) = broadcast::channel(1);
        registry.in_flight.insert(key.clone(), tx);
        registry.stats.new_requests += 1;
        debug!(key = ?key, in_flight = registry.in_flight.len(), "Starting fetch");
        Registration::Leader(FlightGuard {
            coalescer: self,
            key: key.clone(),
            finished: false,
        })
    }

    fn finish(&self, key: &K, outcome: V) {
        let tx = self.registry.lock().in_flight.remove(key);
        if let Some(tx) = tx {
            let waiters = tx.receiver_count();
            // Receivers may already be gone
            let _ = tx.send(outcome);
            if waiters > 0 {
                debug!(key = ?key, waiters, "Shared fetch outcome");
            }
        }
    }

    pub(crate) fn stats(&self) -> CoalescerStats {
        self.registry.lock().stats
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.registry.lock().in_flight.len()
    }
}

/// Leadership of one flight.
///
/// Dropping the guard without completing it (for example when the leading
/// task is cancelled) closes the flight, and waiters see a closed channel.
pub(crate) struct FlightGuard<'a, K: Eq + Hash + Clone, V: Clone> {
    coalescer: &'a Coalescer<K, V>,
    key: K,
    finished: bool,
}

impl<K, V> FlightGuard<'_, K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub(crate) fn complete(mut self, outcome: V) {
        self.finished = true;
        self.coalescer.finish(&self.key, outcome);
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if !self.finished {
            self.coalescer.registry.lock().in_flight.remove(&self.key);
        }
    }
}
