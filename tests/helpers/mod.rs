/// Test doubles simulating the FlexCAN peripheral, the task timer and the
/// sampled input during integration tests.
use flexcan_rtos::{
    core::Frame,
    dispatch::FrameHandler,
    infra::{
        mailbox::{
            id_from_word, CsField, CsWord, Mailbox, MessageRam, CS_CODE_RX_FULL, CS_CODE_TX_DATA,
            CS_CODE_TX_INACTIVE, MB_RAM_WORDS,
        },
        peripheral::{
            FlexCan, Register, MCR_FRZ, MCR_FRZACK, MCR_HALT, MCR_MDIS, MCR_NOTRDY, RXIMR_COUNT,
        },
    },
    traits::{Sampler, SensorSink, TaskTimer},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{sleep, Duration};

#[allow(dead_code)]
pub struct SimState {
    pub ram: [u32; MB_RAM_WORDS],
    pub mcr: u32,
    pub ctrl1: u32,
    pub iflag1: u32,
    pub imask1: u32,
    pub rxmgmask: u32,
    pub rximr: [u32; RXIMR_COUNT as usize],
    /// Frames that left the transmit mailbox, in bus order.
    pub sent: Vec<Frame>,
    /// Never acknowledge freeze mode.
    pub stuck_freeze: bool,
    /// Keep acknowledging freeze after the run request.
    pub stuck_frozen: bool,
    /// Never clear NOTRDY.
    pub never_ready: bool,
    /// Never report transmit completion.
    pub tx_stalled: bool,
}

impl SimState {
    fn frozen(&self) -> bool {
        let halted = self.mcr & (MCR_FRZ | MCR_HALT) == MCR_FRZ | MCR_HALT;
        !self.stuck_freeze && self.mcr & MCR_MDIS == 0 && (halted || self.stuck_frozen)
    }

    fn start_transmission(&mut self) {
        let tx = Mailbox::TX;
        let cs = CsWord(self.ram[tx.word(0)]);
        let len = (cs.read_field(CsField::Dlc) as usize).min(8);
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.ram[tx.word(2)].to_be_bytes());
        bytes[4..].copy_from_slice(&self.ram[tx.word(3)].to_be_bytes());
        let id = id_from_word(self.ram[tx.word(1)]);

        self.sent.push(Frame::new_standard(id, &bytes[..len]));

        if !self.tx_stalled {
            let mut done = cs;
            done.write_field(CsField::Code, CS_CODE_TX_INACTIVE);
            self.ram[tx.word(0)] = done.0;
            self.iflag1 |= tx.flag();
        }
    }
}

#[derive(Clone)]
#[allow(dead_code)]
/// Simulated FlexCAN register file. Clones share the same state, so the
/// context, the interrupt handler and the test each hold their own view.
pub struct SimFlexCan {
    state: Arc<Mutex<SimState>>,
}

#[allow(dead_code)]
impl SimFlexCan {
    /// Peripheral in its reset state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                ram: [0xDEAD_BEEF; MB_RAM_WORDS],
                mcr: 0xD890_000F,
                ctrl1: 0x0000_2000,
                iflag1: 0,
                imask1: 0,
                rxmgmask: 0xFFFF_FFFF,
                rximr: [0xFFFF_FFFF; RXIMR_COUNT as usize],
                sent: Vec::new(),
                stuck_freeze: false,
                stuck_frozen: false,
                never_ready: false,
                tx_stalled: false,
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    /// Another node puts `frame` on the bus: it lands in the receive
    /// mailbox, overwriting whatever was there, and raises its flag.
    pub fn inject_rx(&self, frame: &Frame) {
        let rx = Mailbox::RX;
        let mut state = self.state();
        let mut words = [0u32; 2];
        for (index, byte) in frame.payload().iter().enumerate() {
            words[index / 4] |= (*byte as u32) << ((3 - index % 4) * 8);
        }
        let mut cs = CsWord(0);
        cs.write_field(CsField::Code, CS_CODE_RX_FULL);
        cs.write_field(CsField::Dlc, frame.len as u32);

        state.ram[rx.word(0)] = cs.0;
        state.ram[rx.word(1)] = (frame.id as u32) << 18;
        state.ram[rx.word(2)] = words[0];
        state.ram[rx.word(3)] = words[1];
        state.iflag1 |= rx.flag();
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.state().sent.clone()
    }

    pub fn iflag1(&self) -> u32 {
        self.state().iflag1
    }
}

impl MessageRam for SimFlexCan {
    fn read_word(&self, index: usize) -> u32 {
        self.state().ram[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        let mut state = self.state();
        state.ram[index] = value;
        if index == Mailbox::TX.word(0) && CsWord(value).read_field(CsField::Code) == CS_CODE_TX_DATA
        {
            state.start_transmission();
        }
    }
}

impl FlexCan for SimFlexCan {
    fn read_reg(&self, reg: Register) -> u32 {
        let state = self.state();
        match reg {
            Register::Mcr => {
                let mut mcr = state.mcr & !(MCR_FRZACK | MCR_NOTRDY);
                if state.frozen() {
                    mcr |= MCR_FRZACK;
                }
                if state.never_ready
                    || state.stuck_freeze
                    || state.mcr & MCR_MDIS != 0
                    || state.frozen()
                {
                    mcr |= MCR_NOTRDY;
                }
                mcr
            }
            Register::Ctrl1 => state.ctrl1,
            Register::Timer => 0x1234,
            Register::RxMgMask => state.rxmgmask,
            Register::Imask1 => state.imask1,
            Register::Iflag1 => state.iflag1,
            Register::RxImr(n) => state.rximr[n as usize],
        }
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        let mut state = self.state();
        match reg {
            Register::Mcr => state.mcr = value,
            Register::Ctrl1 => state.ctrl1 = value,
            Register::Timer => {}
            Register::RxMgMask => state.rxmgmask = value,
            Register::Imask1 => state.imask1 = value,
            Register::Iflag1 => state.iflag1 &= !value,
            Register::RxImr(n) => state.rximr[n as usize] = value,
        }
    }
}

#[allow(dead_code)]
/// Task periods elapse on the tokio clock.
pub struct MockTimer;

impl TaskTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

#[allow(dead_code)]
/// Sampler returning a fixed script, then repeating its last value.
pub struct ScriptedSampler {
    values: Vec<u16>,
    next: usize,
}

#[allow(dead_code)]
impl ScriptedSampler {
    pub fn new(values: &[u16]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
        }
    }
}

impl Sampler for ScriptedSampler {
    fn sample(&mut self) -> u16 {
        let index = self.next.min(self.values.len().saturating_sub(1));
        self.next += 1;
        self.values.get(index).copied().unwrap_or(0)
    }
}

#[derive(Default)]
#[allow(dead_code)]
/// Handler recording every frame it receives.
pub struct RecordingHandler {
    frames: Mutex<Vec<Frame>>,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameHandler for RecordingHandler {
    fn on_frame(&self, frame: &Frame) {
        self.frames.lock().unwrap().push(*frame);
    }
}

#[derive(Default)]
#[allow(dead_code)]
/// Sensor sink recording delivered values.
pub struct RecordingSink {
    values: Mutex<Vec<u16>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn values(&self) -> Vec<u16> {
        self.values.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SensorSink for RecordingSink {
    fn on_sensor_value(&self, value: u16) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.values.lock().unwrap().push(value);
    }
}

#[allow(dead_code)]
/// Poll `condition` until it holds or `millis` elapse.
pub async fn eventually(millis: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(millis);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(1)).await;
    }
    condition()
}
