//! Per-path transfer state.
//!
//! A [`Pipe`] lives for one generation: one receiver, one sender, one
//! transfer. Both roles are claimed by atomic test-and-set so a second
//! concurrent claimant of either role observes rejection, never queuing.
//! The rendezvous itself is a capacity-one oneshot handoff: the receiver
//! deposits its sink, the sender awaits it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::oneshot;

/// State for one path and one transfer generation.
///
/// `S` is the receiver sink deposited at rendezvous. The pipe never
/// inspects it; it only guarantees the handoff happens at most once.
pub struct Pipe<S> {
    receiver_attached: AtomicBool,
    sender_attached: AtomicBool,
    transferring: AtomicBool,
    slot_tx: Mutex<Option<oneshot::Sender<S>>>,
    slot_rx: Mutex<Option<oneshot::Receiver<S>>>,
}

impl<S> Pipe<S> {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            receiver_attached: AtomicBool::new(false),
            sender_attached: AtomicBool::new(false),
            transferring: AtomicBool::new(false),
            slot_tx: Mutex::new(Some(tx)),
            slot_rx: Mutex::new(Some(rx)),
        }
    }

    /// Attach a receiver and deposit its sink into the rendezvous slot.
    ///
    /// Fails, returning the sink, if a receiver is already attached or a
    /// transfer is already in progress. The claim is a compare-and-swap:
    /// two simultaneous receivers never both succeed.
    pub fn offer_receiver(&self, sink: S) -> Result<(), S> {
        if self.transferring.load(Ordering::Acquire) {
            return Err(sink);
        }
        if self
            .receiver_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(sink);
        }
        // The CAS above admits exactly one caller here per generation.
        let tx = self
            .slot_tx
            .lock()
            .expect("slot lock")
            .take()
            .expect("receiver slot claimed twice");
        tx.send(sink)
    }

    /// Claim the exclusive sender role. Succeeds exactly once.
    pub fn try_claim_sender(&self) -> bool {
        self.sender_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Await the receiver's sink. Blocks indefinitely until a receiver
    /// attaches; there is no timeout in the engine.
    ///
    /// Returns `None` if the rendezvous can no longer happen (the slot
    /// was already consumed, or the pipe is being torn down).
    pub async fn take_receiver(&self) -> Option<S> {
        let rx = self.slot_rx.lock().expect("slot lock").take()?;
        rx.await.ok()
    }

    /// Mark bytes as flowing. Late receiver arrivals are rejected from
    /// this point on even though the slot was consumed.
    pub fn begin_transfer(&self) {
        self.transferring.store(true, Ordering::Release);
    }

    pub fn is_transferring(&self) -> bool {
        self.transferring.load(Ordering::Acquire)
    }
}

impl<S> Default for Pipe<S> {
    fn default() -> Self {
        Self::new()
    }
}
