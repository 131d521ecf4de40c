//! Error definitions shared across library modules.
//! Every failure is returned synchronously to the caller; none of them is a
//! fault or a panic.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Outcomes of the dispatch table operations.
pub enum DispatchError {
    /// Identifier is in the reserved low range or above 0x7FF.
    #[error("Identifier not allowed")]
    NotAllowed,
    /// Identifier is already registered.
    #[error("Identifier already registered")]
    AlreadyExists,
    /// Identifier is not registered.
    #[error("Identifier not registered")]
    DoesNotExist,
    /// All entries are in use.
    #[error("Dispatch table is full")]
    Full,
    /// There is nothing to remove.
    #[error("Dispatch table is empty")]
    Empty,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Peripheral bring-up failures.
///
/// Each variant names the status bit that never reached the expected state
/// within the configured spin budget.
pub enum InitError {
    /// FRZACK never set after requesting freeze mode.
    #[error("Timed out entering freeze mode")]
    FreezeEntryTimeout,
    /// FRZACK never cleared after leaving freeze mode.
    #[error("Timed out leaving freeze mode")]
    FreezeExitTimeout,
    /// NOTRDY never cleared.
    #[error("Timed out waiting for module ready")]
    NotReadyTimeout,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Steady-state bus failures.
pub enum BusError {
    /// The transmit mailbox never reported completion.
    #[error("Transmit completion timed out")]
    TxTimeout,
}
