//! Frame value type and the identifier constants shared by the codec,
//! the dispatch table and the task layer.
use embedded_can::{Id, StandardId};

/// Mask of an 11-bit standard identifier.
pub const STD_ID_MASK: u16 = 0x07FF;

/// Largest payload of a classic CAN frame.
pub const MAX_DLC: usize = 8;

/// Identifiers up to and including this value are reserved and cannot be
/// registered in the dispatch table.
pub const RESERVED_ID_MAX: u16 = 0x10;

/// Reserved identifier carrying a 16-bit sensor sample (big-endian).
///
/// Frames with this identifier are consumed by the built-in sensor path
/// before the dispatch table is consulted.
pub const SENSOR_VALUE_ID: u16 = 0x10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Classic CAN frame with a standard identifier.
///
/// Fields are public so callers can hand the codec out-of-range values;
/// `id` is masked to 11 bits and `len` clamped to [`MAX_DLC`] on encode.
pub struct Frame {
    /// Standard identifier (only the low 11 bits reach the bus).
    pub id: u16,
    /// Payload buffer; bytes past `len` are zero.
    pub data: [u8; MAX_DLC],
    /// Number of valid payload bytes.
    pub len: usize,
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty(0)
    }
}

impl Frame {
    /// Frame with no payload.
    pub const fn empty(id: u16) -> Self {
        Self {
            id: id & STD_ID_MASK,
            data: [0; MAX_DLC],
            len: 0,
        }
    }

    /// Build a frame, masking `id` to 11 bits and keeping at most eight
    /// payload bytes.
    pub fn new_standard(id: u16, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_DLC);
        let mut data = [0; MAX_DLC];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: id & STD_ID_MASK,
            data,
            len,
        }
    }

    /// Valid payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(MAX_DLC)]
    }

    /// Identifier as it appears on the bus.
    #[inline]
    pub fn standard_id(&self) -> u16 {
        self.id & STD_ID_MASK
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) if data.len() <= MAX_DLC => {
                Some(Self::new_standard(id.as_raw(), data))
            }
            _ => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        // Remote frames are never put on the bus by this driver.
        None
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Standard(StandardId::new(self.standard_id()).unwrap_or(StandardId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.len.min(MAX_DLC)
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
