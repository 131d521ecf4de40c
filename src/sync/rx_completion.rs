//! RX Completion Channel: a one-slot, non-counting wake-up from the receive
//! interrupt to the single receive task.
//!
//! Raising an already raised channel does not queue a second wake-up. Those
//! extra raises are counted so firmware can see how many frames may have
//! been overwritten in the receive mailbox before the task drained it.
//!
//! The raised state is a single atomic flag. The signal only wakes the
//! task, so a stale wake-up is absorbed by the next wait.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

pub struct RxCompletion<M: RawMutex> {
    raised: AtomicBool,
    signal: Signal<M, ()>,
    coalesced: AtomicU32,
}

impl<M: RawMutex> RxCompletion<M> {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            signal: Signal::new(),
            coalesced: AtomicU32::new(0),
        }
    }

    /// Non-blocking, callable from interrupt context.
    pub fn raise(&self) {
        if self.raised.swap(true, Ordering::AcqRel) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "defmt")]
            defmt::warn!("RX wake-up coalesced, a frame may be lost");
        }
        self.signal.signal(());
    }

    /// Wait until raised and consume the raise.
    pub async fn wait(&self) {
        loop {
            if self.raised.swap(false, Ordering::AcqRel) {
                return;
            }
            self.signal.wait().await;
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Raises that landed on an already raised channel.
    pub fn coalesced(&self) -> u32 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<M: RawMutex> Default for RxCompletion<M> {
    fn default() -> Self {
        Self::new()
    }
}
