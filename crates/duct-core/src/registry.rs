//! Path → pipe map.
//!
//! The registry is the only datum mutated by concurrent callers outside a
//! single pipe, so all map mutation happens under one mutex. It is owned
//! by the server instance and passed by reference; nothing here is
//! process-global, which keeps independent servers isolatable in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::pipe::Pipe;

/// Concurrent mapping from path to in-flight [`Pipe`].
///
/// An entry is created by whichever of sender-or-receiver requests the
/// path first and lives for exactly one transfer generation; the sender
/// handler removes it after its relay finishes, so the next request on
/// the same path starts a fresh generation.
pub struct Registry<S> {
    pipes: Mutex<HashMap<String, Arc<Pipe<S>>>>,
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self {
            pipes: Mutex::new(HashMap::new()),
        }
    }

    /// Get the pipe for `path`, creating it if absent.
    ///
    /// Check-then-create runs under a single lock so two concurrent
    /// first-requests for the same path always observe the same pipe;
    /// anything weaker would let a simultaneous sender and receiver pair
    /// with two different pipes and never rendezvous.
    pub fn get_or_create(&self, path: &str) -> Arc<Pipe<S>> {
        let mut pipes = self.pipes.lock().expect("pipes lock");
        pipes
            .entry(path.to_string())
            .or_insert_with(|| {
                debug!(path, "pipe created");
                Arc::new(Pipe::new())
            })
            .clone()
    }

    /// Remove the current entry for `path`, if any.
    ///
    /// Key-based and idempotent: the delete does not check which
    /// generation it removes (matching the historical semantics).
    pub fn remove(&self, path: &str) -> Option<Arc<Pipe<S>>> {
        let mut pipes = self.pipes.lock().expect("pipes lock");
        let removed = pipes.remove(path);
        if removed.is_some() {
            debug!(path, "pipe removed");
        }
        removed
    }

    /// Number of in-flight pipes.
    pub fn len(&self) -> usize {
        self.pipes.lock().expect("pipes lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}
