//! In-process single-flight guard.
//!
//! Concurrent misses for the same fingerprint queue on one async mutex so
//! that only the first holder calls the oracle; later holders re-check the
//! cache after acquiring and normally find the winner's entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use vcheck_models::VideoFingerprint;

/// Per-fingerprint lock table.
///
/// Entries are weak, so a fingerprint's lock disappears once its last
/// holder or waiter is gone.
#[derive(Debug, Default)]
pub struct SingleFlight {
    locks: Mutex<HashMap<VideoFingerprint, Weak<AsyncMutex<()>>>>,
}

/// Held while computing an analysis for one fingerprint.
#[derive(Debug)]
pub struct FlightGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `fingerprint`.
    pub async fn acquire(&self, fingerprint: &VideoFingerprint) -> FlightGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| lock.strong_count() > 0);

            match locks.get(fingerprint).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(fingerprint.clone(), Arc::downgrade(&lock));
                    lock
                }
            }
        };

        if lock.try_lock().is_err() {
            debug!(fingerprint = %fingerprint.short(), "Waiting for in-flight analysis");
        }

        FlightGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of fingerprints with a live lock.
    pub fn in_flight(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}
