//! Register file double shared by the in-crate tests. Models the freeze
//! handshake, write-one-to-clear flags and transmit completion.
use super::*;
use crate::infra::mailbox::{CsField, CsWord, CS_CODE_RX_FULL, CS_CODE_TX_DATA};

const MCR_RESET: u32 = 0xD890_000F;

pub(crate) struct FakeFlexCan {
    pub(crate) ram: [u32; MB_RAM_WORDS],
    pub(crate) mcr: u32,
    pub(crate) ctrl1: u32,
    pub(crate) iflag1: u32,
    pub(crate) imask1: u32,
    pub(crate) rxmgmask: u32,
    pub(crate) rximr: [u32; RXIMR_COUNT as usize],
    /// Never acknowledge freeze, as a module with no clock would.
    pub(crate) stuck: bool,
    /// Report FRZACK whatever the mode, so leaving freeze never completes.
    pub(crate) stuck_frozen: bool,
    /// Keep NOTRDY set whatever the mode.
    pub(crate) never_ready: bool,
    /// Complete transmissions as soon as they are requested.
    pub(crate) auto_complete: bool,
}

impl FakeFlexCan {
    pub(crate) fn new() -> Self {
        Self {
            ram: [0xAAAA_AAAA; MB_RAM_WORDS],
            mcr: MCR_RESET,
            ctrl1: CTRL1_CLKSRC,
            iflag1: 0,
            imask1: 0,
            rxmgmask: 0xFFFF_FFFF,
            rximr: [0xFFFF_FFFF; RXIMR_COUNT as usize],
            stuck: false,
            stuck_frozen: false,
            never_ready: false,
            auto_complete: true,
        }
    }

    /// Place `frame` in the receive mailbox and raise its flag.
    pub(crate) fn inject_rx(&mut self, frame: &Frame) {
        mailbox::encode(self, Mailbox::RX, frame);
        let mut cs = CsWord(self.ram[Mailbox::RX.word(0)]);
        cs.write_field(CsField::Code, CS_CODE_RX_FULL);
        self.ram[Mailbox::RX.word(0)] = cs.0;
        self.iflag1 |= Mailbox::RX.flag();
    }

    fn frozen(&self) -> bool {
        let halted = self.mcr & (MCR_FRZ | MCR_HALT) == MCR_FRZ | MCR_HALT;
        !self.stuck && self.mcr & MCR_MDIS == 0 && (halted || self.stuck_frozen)
    }
}

impl MessageRam for FakeFlexCan {
    fn read_word(&self, index: usize) -> u32 {
        self.ram[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.ram[index] = value;
        let tx_cs = Mailbox::TX.word(0);
        if self.auto_complete && index == tx_cs && (value >> 24) & 0xF == CS_CODE_TX_DATA {
            self.iflag1 |= Mailbox::TX.flag();
        }
    }
}

impl FlexCan for FakeFlexCan {
    fn read_reg(&self, reg: Register) -> u32 {
        match reg {
            Register::Mcr => {
                let mut mcr = self.mcr & !(MCR_FRZACK | MCR_NOTRDY);
                if self.frozen() {
                    mcr |= MCR_FRZACK;
                }
                if self.never_ready || self.stuck || self.mcr & MCR_MDIS != 0 || self.frozen() {
                    mcr |= MCR_NOTRDY;
                }
                mcr
            }
            Register::Ctrl1 => self.ctrl1,
            Register::Timer => 0,
            Register::RxMgMask => self.rxmgmask,
            Register::Imask1 => self.imask1,
            Register::Iflag1 => self.iflag1,
            Register::RxImr(n) => self.rximr[n as usize],
        }
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        match reg {
            Register::Mcr => self.mcr = value,
            Register::Ctrl1 => self.ctrl1 = value,
            Register::Timer => {}
            Register::RxMgMask => self.rxmgmask = value,
            Register::Imask1 => self.imask1 = value,
            Register::Iflag1 => self.iflag1 &= !value,
            Register::RxImr(n) => self.rximr[n as usize] = value,
        }
    }
}
