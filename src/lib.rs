//! `flexcan-rtos` library: FlexCAN mailbox driver and the coordination layer
//! letting several tasks share one CAN mailbox pair in a `no_std`
//! environment. The crate exposes the hardware layers (mailbox codec,
//! register boundary), the synchronization primitives, the identifier
//! dispatch table and the node context tying them together.
#![cfg_attr(not(test), no_std)]
//==================================================================================
/// Frame value type and the identifier ranges shared by every layer.
pub mod core;
/// Synchronous errors returned by the dispatch table, bring-up and bus.
pub mod error;
/// Bus speed presets, receive strategy and task periods.
pub mod config;
/// Mailbox codec and FlexCAN register boundary.
pub mod infra;
/// Bus guard, RX completion channel and TX request multiplexer.
pub mod sync;
/// Bounded registry routing received identifiers to handlers.
pub mod dispatch;
/// Node context and task bodies.
pub mod node;
/// Timer, sampler and sensor sink collaborators.
pub mod traits;
//==================================================================================
pub use crate::config::{BusSpeed, Config, RxMode};
pub use crate::core::Frame;
pub use crate::dispatch::{DispatchTable, FrameHandler};
pub use crate::error::{BusError, DispatchError, InitError};
pub use crate::node::{CanContext, Delivery, PeriodicSource};
