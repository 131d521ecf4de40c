//! Identifier Dispatch Table: a bounded, dense registry mapping received
//! standard identifiers to handlers.
//!
//! Entries keep insertion order. Identifiers are unique, and the reserved
//! range `..=RESERVED_ID_MAX` is refused because the built-in sensor path
//! consumes those frames before the table is consulted.
use core::fmt;

use heapless::Vec;

use crate::core::{Frame, RESERVED_ID_MAX, STD_ID_MASK};
use crate::error::DispatchError;

/// Capacity of the table used by the driver context.
pub const DISPATCH_CAPACITY: usize = 15;

/// Callback invoked for every received frame whose identifier matches.
pub trait FrameHandler {
    fn on_frame(&self, frame: &Frame);
}

impl<F: Fn(&Frame)> FrameHandler for F {
    fn on_frame(&self, frame: &Frame) {
        self(frame)
    }
}

pub type HandlerRef<'h> = &'h (dyn FrameHandler + Sync);

#[derive(Clone, Copy)]
pub struct DispatchEntry<'h> {
    pub id: u16,
    pub handler: HandlerRef<'h>,
}

impl fmt::Debug for DispatchEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("id", &format_args!("{:#05x}", self.id))
            .finish_non_exhaustive()
    }
}

/// Whether `id` may be registered.
#[inline]
pub const fn is_registrable(id: u16) -> bool {
    id > RESERVED_ID_MAX && id <= STD_ID_MASK
}

/// Call each handler with `frame`, in order. Returns how many ran.
pub fn invoke<'h>(handlers: impl IntoIterator<Item = HandlerRef<'h>>, frame: &Frame) -> usize {
    let mut invoked = 0;
    for handler in handlers {
        handler.on_frame(frame);
        invoked += 1;
    }

    #[cfg(feature = "defmt")]
    {
        if invoked == 0 {
            defmt::trace!("No handler for id {=u16:#x}", frame.id);
        }
    }

    invoked
}

pub struct DispatchTable<'h, const N: usize = DISPATCH_CAPACITY> {
    entries: Vec<DispatchEntry<'h>, N>,
}

impl<'h, const N: usize> DispatchTable<'h, N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a handler for `id`.
    pub fn add(&mut self, id: u16, handler: HandlerRef<'h>) -> Result<(), DispatchError> {
        if !is_registrable(id) {
            return Err(DispatchError::NotAllowed);
        }
        if self.position(id).is_some() {
            return Err(DispatchError::AlreadyExists);
        }
        self.entries
            .push(DispatchEntry { id, handler })
            .map_err(|_| DispatchError::Full)?;

        #[cfg(feature = "defmt")]
        defmt::info!("Handler added for id {=u16:#x} ({} entries)", id, self.entries.len());

        Ok(())
    }

    /// Remove the handler for `id`; later entries shift left by one.
    pub fn remove(&mut self, id: u16) -> Result<(), DispatchError> {
        if self.entries.is_empty() {
            return Err(DispatchError::Empty);
        }
        if !is_registrable(id) {
            return Err(DispatchError::NotAllowed);
        }
        let index = self.position(id).ok_or(DispatchError::DoesNotExist)?;
        self.entries.remove(index);

        #[cfg(feature = "defmt")]
        defmt::info!("Handler removed for id {=u16:#x} ({} entries)", id, self.entries.len());

        Ok(())
    }

    /// Overwrite the entry for `old_id` in place with `new_id` and `handler`.
    ///
    /// `new_id` may equal `old_id`. It may not equal the id of another entry.
    pub fn replace(
        &mut self,
        old_id: u16,
        new_id: u16,
        handler: HandlerRef<'h>,
    ) -> Result<(), DispatchError> {
        if !is_registrable(new_id) {
            return Err(DispatchError::NotAllowed);
        }
        let index = self.position(old_id).ok_or(DispatchError::DoesNotExist)?;
        if new_id != old_id && self.position(new_id).is_some() {
            return Err(DispatchError::AlreadyExists);
        }
        self.entries[index] = DispatchEntry {
            id: new_id,
            handler,
        };

        #[cfg(feature = "defmt")]
        defmt::info!("Handler for id {=u16:#x} replaced by id {=u16:#x}", old_id, new_id);

        Ok(())
    }

    /// Invoke every handler registered for the frame identifier, in table
    /// order. Returns how many ran.
    ///
    /// Handlers run with the table borrowed. A table shared behind a lock
    /// collects [`matching`](Self::matching) handlers under the lock and
    /// passes them to [`invoke`] after release.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        invoke(self.matching(frame.id).map(|entry| entry.handler), frame)
    }

    /// Entries whose identifier equals `id`, in table order.
    pub fn matching(&self, id: u16) -> impl Iterator<Item = &DispatchEntry<'h>> {
        self.entries.iter().filter(move |entry| entry.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    fn position(&self, id: u16) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }
}

impl<const N: usize> Default for DispatchTable<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for DispatchTable<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}
