use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::http::connection::ConnectionHandle;

/// Live connections by id, shared between the acceptor, the reaper, and the
/// quit callbacks of the driver tasks.
///
/// At most one entry exists per id, and removal is idempotent. Closing
/// through the table only signals the driver; the socket is dropped by the
/// driver task once it observes the signal.
#[derive(Default)]
pub struct ConnectionTable {
    inner: Mutex<HashMap<u64, Arc<ConnectionHandle>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: Arc<ConnectionHandle>) {
        let mut map = self.lock();
        map.insert(handle.id(), handle);
    }

    pub fn remove(&self, id: u64) {
        let mut map = self.lock();
        map.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Signals every connection to drain and exit, then clears the table.
    pub fn close_all(&self) {
        let mut map = self.lock();
        for handle in map.values() {
            handle.close();
        }
        map.clear();
    }

    /// Closes and removes every connection idle longer than `max_idle`.
    ///
    /// Returns the number of reaped connections.
    pub fn sweep(&self, now: Instant, max_idle: Duration) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|id, handle| {
            if handle.idle_for(now) > max_idle {
                tracing::debug!(id = *id, "reaping idle connection");
                handle.close();
                false
            } else {
                true
            }
        });
        before - map.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<ConnectionHandle>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
