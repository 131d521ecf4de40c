//! Mailbox codec: packs a [`Frame`] into the fixed four-word message buffer
//! layout of the FlexCAN RAM and unpacks it again.
//!
//! ```text
//! word 0  control/status  CODE[27:24] SRR[22] IDE[21] DLC[19:16] TIMESTAMP[15:0]
//! word 1  identifier      ID_STD[28:18]
//! word 2  data            byte0[31:24] byte1[23:16] byte2[15:8] byte3[7:0]
//! word 3  data            byte4[31:24] byte5[23:16] byte6[15:8] byte7[7:0]
//! ```
//!
//! The layout, bit positions and byte order are a hardware contract shared
//! with every other node on the bus.
use crate::core::{Frame, MAX_DLC, STD_ID_MASK};

//==================================================================================LAYOUT
/// Words per message buffer (8-byte payload configuration).
pub const MB_WORDS: usize = 4;
/// Number of RAM words backing the message buffers.
pub const MB_RAM_WORDS: usize = 128;

const CS_POS: usize = 0;
const ID_POS: usize = 1;
const DATA_POS: usize = 2;
const DATA_WORDS: usize = 2;

pub const CS_CODE_RX_INACTIVE: u32 = 0x0;
pub const CS_CODE_RX_FULL: u32 = 0x2;
pub const CS_CODE_RX_EMPTY: u32 = 0x4;
pub const CS_CODE_RX_OVERRUN: u32 = 0x6;
pub const CS_CODE_TX_INACTIVE: u32 = 0x8;
pub const CS_CODE_TX_DATA: u32 = 0xC;

/// Control word written last to start a transmission (code 0xC, SRR set).
pub const TX_COMMAND: u32 = 0x0C40_0000;
/// Control word that leaves a mailbox empty and enabled for reception.
pub const RX_ENABLE: u32 = 0x0400_0000;

/// Most significant byte of a data word.
const DATA_MSB_MASK: u32 = 0xFF00_0000;

//==================================================================================RAM
/// Word-level access to message buffer memory.
///
/// The peripheral implements this with volatile accesses; plain arrays
/// implement it so the codec can run without hardware.
pub trait MessageRam {
    fn read_word(&self, index: usize) -> u32;
    fn write_word(&mut self, index: usize, value: u32);
}

impl<const N: usize> MessageRam for [u32; N] {
    fn read_word(&self, index: usize) -> u32 {
        self[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self[index] = value;
    }
}

/// Index of a message buffer. Only the two dedicated mailboxes exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mailbox(u8);

impl Mailbox {
    /// Mailbox dedicated to transmission.
    pub const TX: Mailbox = Mailbox(0);
    /// Mailbox dedicated to reception.
    pub const RX: Mailbox = Mailbox(4);

    /// RAM word index of word `pos` of this mailbox.
    #[inline]
    pub const fn word(&self, pos: usize) -> usize {
        debug_assert!(pos < MB_WORDS);
        self.0 as usize * MB_WORDS + pos
    }

    /// Bit of this mailbox in IFLAG1 / IMASK1.
    #[inline]
    pub const fn flag(&self) -> u32 {
        1 << self.0 as u32
    }
}

//==================================================================================FIELDS
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsField {
    Code,
    Srr,
    Ide,
    Dlc,
    Timestamp,
}

impl CsField {
    const fn mask(&self) -> u32 {
        match self {
            CsField::Code => 0x0F00_0000,
            CsField::Srr => 0x0040_0000,
            CsField::Ide => 0x0020_0000,
            CsField::Dlc => 0x000F_0000,
            CsField::Timestamp => 0x0000_FFFF,
        }
    }

    const fn shift(&self) -> u32 {
        match self {
            CsField::Code => 24,
            CsField::Srr => 22,
            CsField::Ide => 21,
            CsField::Dlc => 16,
            CsField::Timestamp => 0,
        }
    }
}

/// Control/status word of a message buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CsWord(pub u32);

impl CsWord {
    pub fn write_field(&mut self, field: CsField, value: u32) {
        self.0 = (self.0 & !field.mask()) | ((value << field.shift()) & field.mask());
    }

    pub fn read_field(&self, field: CsField) -> u32 {
        (self.0 & field.mask()) >> field.shift()
    }
}

const ID_STD_MASK: u32 = 0x1FFC_0000;
const ID_STD_SHIFT: u32 = 18;

/// Identifier word holding an 11-bit id left-justified at bit 18.
#[inline]
pub const fn id_word(id: u16) -> u32 {
    ((id & STD_ID_MASK) as u32) << ID_STD_SHIFT
}

#[inline]
pub const fn id_from_word(word: u32) -> u16 {
    ((word & ID_STD_MASK) >> ID_STD_SHIFT) as u16
}

//==================================================================================CODEC
/// Packs up to eight bytes most-significant-byte first into two words,
/// zero padded.
pub fn pack_payload(payload: &[u8]) -> [u32; DATA_WORDS] {
    let mut words = [0u32; DATA_WORDS];
    for (index, byte) in payload.iter().take(MAX_DLC).enumerate() {
        words[index / 4] |= (*byte as u32) << ((3 - (index % 4)) * 8);
    }
    words
}

/// Writes `frame` into `mailbox` and issues the transmit command.
///
/// Data words go first, then the identifier, then the control word: the
/// control word hands the buffer to the hardware and must come last.
/// The identifier is masked to 11 bits and the length clamped to 8.
pub fn encode<R: MessageRam + ?Sized>(ram: &mut R, mailbox: Mailbox, frame: &Frame) {
    let len = frame.len.min(MAX_DLC);
    let words = pack_payload(&frame.data[..len]);

    for (offset, word) in words.iter().enumerate() {
        ram.write_word(mailbox.word(DATA_POS + offset), *word);
    }
    ram.write_word(mailbox.word(ID_POS), id_word(frame.id));

    let mut cs = CsWord(TX_COMMAND);
    cs.write_field(CsField::Dlc, len as u32);
    ram.write_word(mailbox.word(CS_POS), cs.0);
}

/// Reads the frame held by `mailbox`, then re-arms it for reception.
pub fn decode<R: MessageRam + ?Sized>(ram: &mut R, mailbox: Mailbox) -> Frame {
    let cs = CsWord(ram.read_word(mailbox.word(CS_POS)));
    let len = (cs.read_field(CsField::Dlc) as usize).min(MAX_DLC);
    let id = id_from_word(ram.read_word(mailbox.word(ID_POS)));

    let mut words = [0u32; DATA_WORDS];
    for (offset, word) in words.iter_mut().enumerate() {
        *word = ram.read_word(mailbox.word(DATA_POS + offset));
    }

    let mut data = [0u8; MAX_DLC];
    for (index, byte) in data.iter_mut().take(len).enumerate() {
        let word = &mut words[index / 4];
        *byte = ((*word & DATA_MSB_MASK) >> 24) as u8;
        *word <<= 8;
    }

    arm_receive(ram, mailbox);

    Frame { id, data, len }
}

/// Puts `mailbox` in the empty state, ready to accept the next frame.
#[inline]
pub fn arm_receive<R: MessageRam + ?Sized>(ram: &mut R, mailbox: Mailbox) {
    ram.write_word(mailbox.word(CS_POS), RX_ENABLE);
}

/// Code field of the mailbox control word.
#[inline]
pub fn code<R: MessageRam + ?Sized>(ram: &R, mailbox: Mailbox) -> u32 {
    CsWord(ram.read_word(mailbox.word(CS_POS))).read_field(CsField::Code)
}
