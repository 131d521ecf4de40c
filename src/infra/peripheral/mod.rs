//! Hardware boundary for the FlexCAN module: register access, bring-up,
//! and the guarded transmit/receive primitives built on the mailbox codec.
//!
//! All busy-wait loops of the driver live here and are bounded by a spin
//! budget; nothing above this module polls hardware status.
use core::ptr;

use crate::config::BusSpeed;
use crate::core::Frame;
use crate::error::{BusError, InitError};
use crate::infra::mailbox::{self, Mailbox, MessageRam, MB_RAM_WORDS};

//==================================================================================REGISTERS
/// Base address of CAN0 on the S32K14x.
pub const CAN0_BASE: usize = 0x4002_4000;

/// Offset of the message buffer RAM from the module base.
pub const RAM_OFFSET: usize = 0x80;

/// Number of individual receive mask registers.
pub const RXIMR_COUNT: u8 = 16;

pub const MCR_MDIS: u32 = 0x8000_0000;
pub const MCR_FRZ: u32 = 0x4000_0000;
pub const MCR_HALT: u32 = 0x1000_0000;
pub const MCR_NOTRDY: u32 = 0x0800_0000;
pub const MCR_FRZACK: u32 = 0x0100_0000;

/// MCR value applied at the end of bring-up: freeze released, CAN-FD off,
/// 32 message buffers.
pub const MCR_RUN: u32 = 0x0000_001F;

pub const CTRL1_CLKSRC: u32 = 0x0000_2000;

/// Accept every identifier.
pub const ACCEPT_ALL: u32 = 0x0000_0000;

/// IFLAG1 value clearing every flag except the transmit mailbox one,
/// which the transmit path waits on.
pub const CLEAR_ALL_BUT_TX: u32 = 0xFFFF_FFFE;
pub const CLEAR_ALL_FLAGS: u32 = 0xFFFF_FFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Mcr,
    Ctrl1,
    Timer,
    RxMgMask,
    Imask1,
    Iflag1,
    RxImr(u8),
}

impl Register {
    /// Byte offset from the module base.
    pub const fn offset(&self) -> usize {
        match self {
            Register::Mcr => 0x00,
            Register::Ctrl1 => 0x04,
            Register::Timer => 0x08,
            Register::RxMgMask => 0x10,
            Register::Imask1 => 0x28,
            Register::Iflag1 => 0x30,
            Register::RxImr(n) => 0x880 + (*n as usize) * 4,
        }
    }
}

/// Register-level view of one FlexCAN instance.
///
/// IFLAG1 is write-one-to-clear.
pub trait FlexCan: MessageRam {
    fn read_reg(&self, reg: Register) -> u32;
    fn write_reg(&mut self, reg: Register, value: u32);

    fn modify_reg(&mut self, reg: Register, f: impl FnOnce(u32) -> u32) {
        let value = self.read_reg(reg);
        self.write_reg(reg, f(value));
    }
}

/// Memory-mapped FlexCAN instance.
#[derive(Clone, Copy, Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    /// `base` must be the base address of a clocked FlexCAN module, and the
    /// caller must uphold the aliasing rules of the driver: one view is owned
    /// by the bus guard, other views only touch IFLAG1.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// # Safety
    /// See [`Mmio::new`].
    pub const unsafe fn can0() -> Self {
        Self { base: CAN0_BASE }
    }

    #[inline]
    fn reg_ptr(&self, offset: usize) -> *mut u32 {
        (self.base + offset) as *mut u32
    }
}

impl MessageRam for Mmio {
    fn read_word(&self, index: usize) -> u32 {
        unsafe { ptr::read_volatile(self.reg_ptr(RAM_OFFSET + index * 4)) }
    }

    fn write_word(&mut self, index: usize, value: u32) {
        unsafe { ptr::write_volatile(self.reg_ptr(RAM_OFFSET + index * 4), value) }
    }
}

impl FlexCan for Mmio {
    fn read_reg(&self, reg: Register) -> u32 {
        unsafe { ptr::read_volatile(self.reg_ptr(reg.offset())) }
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        unsafe { ptr::write_volatile(self.reg_ptr(reg.offset()), value) }
    }
}

//==================================================================================INTERRUPT
/// Interrupt-context acknowledgement of the mailbox interrupt.
///
/// Returns whether the receive mailbox flagged a frame, then clears every
/// flag except the transmit one. Only IFLAG1 is touched, so this may run
/// while a task holds the bus guard.
pub fn acknowledge_interrupt<P: FlexCan + ?Sized>(regs: &mut P) -> bool {
    let received = regs.read_reg(Register::Iflag1) & Mailbox::RX.flag() != 0;
    regs.write_reg(Register::Iflag1, CLEAR_ALL_BUT_TX);
    received
}

//==================================================================================CONTROLLER
/// Owns the register view and performs every mailbox access.
pub struct CanController<P: FlexCan> {
    regs: P,
    init_spin_limit: u32,
    tx_spin_limit: u32,
}

impl<P: FlexCan> CanController<P> {
    pub const fn new(regs: P, init_spin_limit: u32, tx_spin_limit: u32) -> Self {
        Self {
            regs,
            init_spin_limit,
            tx_spin_limit,
        }
    }

    pub fn regs(&self) -> &P {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut P {
        &mut self.regs
    }

    /// Bring the module from reset into normal operation at `speed`, with
    /// accept-all filtering and the receive mailbox armed.
    ///
    /// The module clock and pins must already be configured.
    pub fn init(&mut self, speed: BusSpeed) -> Result<(), InitError> {
        #[cfg(feature = "defmt")]
        defmt::info!("FlexCAN init at {} bit/s", speed.to_bps());

        self.regs.modify_reg(Register::Mcr, |mcr| mcr | MCR_MDIS);
        self.regs.modify_reg(Register::Ctrl1, |ctrl1| ctrl1 & !CTRL1_CLKSRC);
        self.regs
            .modify_reg(Register::Mcr, |mcr| (mcr & !MCR_MDIS) | MCR_FRZ | MCR_HALT);

        if !self.wait_for(Register::Mcr, MCR_FRZACK, true, self.init_spin_limit) {
            return Err(InitError::FreezeEntryTimeout);
        }

        self.regs.write_reg(Register::Ctrl1, speed.ctrl1());

        for index in 0..MB_RAM_WORDS {
            self.regs.write_word(index, 0);
        }
        for n in 0..RXIMR_COUNT {
            self.regs.write_reg(Register::RxImr(n), ACCEPT_ALL);
        }
        self.regs.write_reg(Register::RxMgMask, ACCEPT_ALL);

        mailbox::arm_receive(&mut self.regs, Mailbox::RX);

        self.regs.write_reg(Register::Mcr, MCR_RUN);

        if !self.wait_for(Register::Mcr, MCR_FRZACK, false, self.init_spin_limit) {
            return Err(InitError::FreezeExitTimeout);
        }
        if !self.wait_for(Register::Mcr, MCR_NOTRDY, false, self.init_spin_limit) {
            return Err(InitError::NotReadyTimeout);
        }

        #[cfg(feature = "defmt")]
        defmt::info!("FlexCAN ready");

        Ok(())
    }

    /// Unmask the receive mailbox interrupt.
    pub fn enable_rx_interrupt(&mut self) {
        self.regs.write_reg(Register::Imask1, Mailbox::RX.flag());
    }

    /// Send `frame` through the transmit mailbox and wait for completion.
    pub fn transmit(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.regs.write_reg(Register::Iflag1, Mailbox::TX.flag());

        mailbox::encode(&mut self.regs, Mailbox::TX, frame);

        if !self.wait_for(Register::Iflag1, Mailbox::TX.flag(), true, self.tx_spin_limit) {
            #[cfg(feature = "defmt")]
            defmt::error!("Transmit of id {=u16:#x} never completed", frame.standard_id());
            return Err(BusError::TxTimeout);
        }

        self.regs.write_reg(Register::Iflag1, Mailbox::TX.flag());

        #[cfg(feature = "defmt")]
        defmt::debug!("Sent {}", frame);

        Ok(())
    }

    /// Read the receive mailbox and re-arm it.
    ///
    /// Does not check that a frame is present; see [`Self::rx_pending`].
    pub fn receive(&mut self) -> Frame {
        let frame = mailbox::decode(&mut self.regs, Mailbox::RX);

        // Reading the free-running timer releases the mailbox lock.
        let _ = self.regs.read_reg(Register::Timer);
        self.regs.write_reg(Register::Iflag1, Mailbox::RX.flag());

        #[cfg(feature = "defmt")]
        defmt::debug!("Received {}", frame);

        frame
    }

    /// Receive flag of the receive mailbox.
    pub fn rx_pending(&self) -> bool {
        self.regs.read_reg(Register::Iflag1) & Mailbox::RX.flag() != 0
    }

    /// Completion flag of the transmit mailbox.
    pub fn tx_complete(&self) -> bool {
        self.regs.read_reg(Register::Iflag1) & Mailbox::TX.flag() != 0
    }

    pub fn clear_all_flags(&mut self) {
        self.regs.write_reg(Register::Iflag1, CLEAR_ALL_FLAGS);
    }

    fn wait_for(&self, reg: Register, mask: u32, set: bool, limit: u32) -> bool {
        for _ in 0..limit {
            if (self.regs.read_reg(reg) & mask != 0) == set {
                return true;
            }
            core::hint::spin_loop();
        }
        false
    }
}

//==================================================================================TESTS
#[cfg(test)]
pub(crate) mod fake;
