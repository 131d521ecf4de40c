//! TX Request Multiplexer: independent producers raise their flag without
//! blocking, the single transmit task drains every observed flag.
//!
//! Flags carry no frame data. Each producer stages its frame before raising.
use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

bitflags! {
    /// Producers asking the transmit task for service.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct TxRequest: u32 {
        /// Periodic publisher, sent first when both flags are observed.
        const PERIODIC = 0b01;
        /// Triggered publisher.
        const TRIGGERED = 0b10;
    }
}

impl TxRequest {
    /// Observed flags in service order.
    pub fn service_order(self) -> impl Iterator<Item = TxRequest> {
        [TxRequest::PERIODIC, TxRequest::TRIGGERED]
            .into_iter()
            .filter(move |request| self.contains(*request))
    }
}

pub struct TxRequests<M: RawMutex> {
    pending: AtomicU32,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> TxRequests<M> {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
            wake: Signal::new(),
        }
    }

    /// Non-blocking, callable from interrupt context.
    pub fn raise(&self, request: TxRequest) {
        self.pending.fetch_or(request.bits(), Ordering::AcqRel);
        self.wake.signal(());
    }

    /// Wait until at least one flag is set, then clear and return exactly
    /// the flags observed. Flags raised afterwards stay pending.
    pub async fn wait_any(&self) -> TxRequest {
        loop {
            let observed = self.pending.load(Ordering::Acquire);
            if observed != 0 {
                self.pending.fetch_and(!observed, Ordering::AcqRel);
                return TxRequest::from_bits_truncate(observed);
            }
            self.wake.wait().await;
        }
    }

    pub fn pending(&self) -> TxRequest {
        TxRequest::from_bits_truncate(self.pending.load(Ordering::Acquire))
    }
}

impl<M: RawMutex> Default for TxRequests<M> {
    fn default() -> Self {
        Self::new()
    }
}
