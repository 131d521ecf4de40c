//! Coordination primitives shared between the interrupt handler and the
//! driver tasks.
//!
//! Every primitive is generic over an [`embassy_sync`] raw mutex so the
//! firmware picks the critical-section flavour matching its scheduler.
pub mod bus_guard;
pub mod rx_completion;
pub mod tx_requests;

pub use bus_guard::BusGuard;
pub use rx_completion::RxCompletion;
pub use tx_requests::{TxRequest, TxRequests};
