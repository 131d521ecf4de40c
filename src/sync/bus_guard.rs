//! Bus Access Guard: serializes every mailbox access of the receive task,
//! the transmit task and direct callers.
//!
//! The guard owns the [`CanController`], so the mailbox RAM cannot be
//! reached without holding it. Release happens when the lock guard drops,
//! which covers every exit path of the closure passed to [`BusGuard::access`].
//!
//! Acquisition waits without a timeout. A holder that never returns stalls
//! every other bus user.
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

use crate::config::BusSpeed;
use crate::core::Frame;
use crate::error::{BusError, InitError};
use crate::infra::peripheral::{CanController, FlexCan};

pub struct BusGuard<M: RawMutex, P: FlexCan> {
    controller: Mutex<M, CanController<P>>,
}

impl<M: RawMutex, P: FlexCan> BusGuard<M, P> {
    pub const fn new(controller: CanController<P>) -> Self {
        Self {
            controller: Mutex::new(controller),
        }
    }

    /// Run `f` with exclusive access to the controller.
    pub async fn access<R>(&self, f: impl FnOnce(&mut CanController<P>) -> R) -> R {
        let mut controller = self.controller.lock().await;
        f(&mut controller)
    }

    /// `true` when nobody holds the guard.
    pub fn is_idle(&self) -> bool {
        self.controller.try_lock().is_ok()
    }

    pub async fn init(&self, speed: BusSpeed, rx_interrupt: bool) -> Result<(), InitError> {
        self.access(|can| {
            can.init(speed)?;
            if rx_interrupt {
                can.enable_rx_interrupt();
            }
            Ok(())
        })
        .await
    }

    /// Guarded transmit through the transmit mailbox.
    pub async fn send(&self, frame: &Frame) -> Result<(), BusError> {
        self.access(|can| can.transmit(frame)).await
    }

    /// Guarded read of the receive mailbox, whether or not a frame arrived.
    pub async fn receive(&self) -> Frame {
        self.access(|can| can.receive()).await
    }

    /// Guarded check-and-read used by the polling receive task.
    ///
    /// Clears every interrupt flag after a read, the transmit one included.
    pub async fn receive_if_pending(&self) -> Option<Frame> {
        self.access(|can| {
            if !can.rx_pending() {
                return None;
            }
            let frame = can.receive();
            can.clear_all_flags();
            Some(frame)
        })
        .await
    }
}
