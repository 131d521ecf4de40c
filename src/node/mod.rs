//! Driver context owning every shared piece of the CAN node: the bus guard,
//! the two wake-up primitives, the dispatch table and the staged frames.
//!
//! Built once at startup (usually into a `static`) and shared by reference
//! with the tasks in [`tasks`] and the interrupt handler.
//!
//! ```rust, ignore
//! static CAN: CanContext<'static, CriticalSectionRawMutex, Mmio> =
//!     CanContext::new(unsafe { Mmio::can0() }, Config::DEFAULT);
//!
//! CAN.init().await?;
//! CAN.register_handler(0x123, &MY_HANDLER)?;
//! CAN.set_triggered_frame(0x321, &[0xAA, 0x55]);
//! CAN.run(adc, EmbassyTimer, EmbassyTimer).await;
//!
//! #[interrupt]
//! fn CAN0_ORed_0_15_MB() {
//!     let mut regs = unsafe { Mmio::can0() };
//!     CAN.on_interrupt(&mut regs);
//! }
//! ```
pub mod tasks;

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use heapless::Vec;

use crate::config::{Config, RxMode};
use crate::core::{Frame, SENSOR_VALUE_ID};
use crate::dispatch::{self, DispatchTable, HandlerRef, DISPATCH_CAPACITY};
use crate::error::{BusError, DispatchError, InitError};
use crate::infra::peripheral::{acknowledge_interrupt, CanController, FlexCan};
use crate::sync::{BusGuard, RxCompletion, TxRequest, TxRequests};
use crate::traits::SensorSink;

/// What the periodic transmit request sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeriodicSource {
    /// Latest sample, big-endian in two bytes, to `id`.
    Sample { id: u16 },
    /// A fixed staged frame.
    Fixed(Frame),
}

/// Outcome of routing one received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Consumed by the built-in sensor path.
    SensorValue(u16),
    /// Number of table handlers invoked.
    Handlers(usize),
    /// No handler matched, or a sensor frame was too short.
    Dropped,
}

struct Staging {
    triggered: Option<Frame>,
    periodic: PeriodicSource,
}

pub struct CanContext<'h, M: RawMutex, P: FlexCan> {
    config: Config,
    bus: BusGuard<M, P>,
    rx_done: RxCompletion<M>,
    tx_requests: TxRequests<M>,
    table: BlockingMutex<M, RefCell<DispatchTable<'h>>>,
    staging: BlockingMutex<M, RefCell<Staging>>,
    sensor_sink: BlockingMutex<M, Cell<Option<&'h (dyn SensorSink + Sync)>>>,
    last_sensor_value: BlockingMutex<M, Cell<Option<u16>>>,
    latest_sample: AtomicU16,
    rx_poll_period_ms: AtomicU32,
    publish_period_ms: AtomicU32,
}

impl<'h, M: RawMutex, P: FlexCan> CanContext<'h, M, P> {
    pub const fn new(peripheral: P, config: Config) -> Self {
        Self {
            config,
            bus: BusGuard::new(CanController::new(
                peripheral,
                config.init_spin_limit,
                config.tx_spin_limit,
            )),
            rx_done: RxCompletion::new(),
            tx_requests: TxRequests::new(),
            table: BlockingMutex::new(RefCell::new(DispatchTable::new())),
            staging: BlockingMutex::new(RefCell::new(Staging {
                triggered: None,
                periodic: PeriodicSource::Sample {
                    id: SENSOR_VALUE_ID,
                },
            })),
            sensor_sink: BlockingMutex::new(Cell::new(None)),
            last_sensor_value: BlockingMutex::new(Cell::new(None)),
            latest_sample: AtomicU16::new(0),
            rx_poll_period_ms: AtomicU32::new(config.rx_poll_period_ms),
            publish_period_ms: AtomicU32::new(config.publish_period_ms),
        }
    }

    /// Bring the peripheral up with the configured speed; in interrupt
    /// receive mode the receive mailbox interrupt is unmasked too.
    pub async fn init(&self) -> Result<(), InitError> {
        self.bus
            .init(self.config.speed, self.config.rx_mode == RxMode::Interrupt)
            .await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &BusGuard<M, P> {
        &self.bus
    }

    pub fn rx_completion(&self) -> &RxCompletion<M> {
        &self.rx_done
    }

    pub fn tx_requests(&self) -> &TxRequests<M> {
        &self.tx_requests
    }

    //==================================================================================HANDLERS
    pub fn register_handler(&self, id: u16, handler: HandlerRef<'h>) -> Result<(), DispatchError> {
        self.table.lock(|table| table.borrow_mut().add(id, handler))
    }

    pub fn unregister_handler(&self, id: u16) -> Result<(), DispatchError> {
        self.table.lock(|table| table.borrow_mut().remove(id))
    }

    pub fn replace_handler(
        &self,
        old_id: u16,
        new_id: u16,
        handler: HandlerRef<'h>,
    ) -> Result<(), DispatchError> {
        self.table
            .lock(|table| table.borrow_mut().replace(old_id, new_id, handler))
    }

    /// Registered identifiers in table order.
    pub fn registered_ids(&self) -> Vec<u16, DISPATCH_CAPACITY> {
        self.table.lock(|table| table.borrow().ids().collect())
    }

    pub fn set_sensor_sink(&self, sink: &'h (dyn SensorSink + Sync)) {
        self.sensor_sink.lock(|slot| slot.set(Some(sink)));
    }

    //==================================================================================STAGING
    /// Stage the frame sent on every triggered request. Stays staged until
    /// replaced.
    pub fn set_triggered_frame(&self, id: u16, payload: &[u8]) {
        let frame = Frame::new_standard(id, payload);
        self.staging
            .lock(|staging| staging.borrow_mut().triggered = Some(frame));
    }

    pub fn triggered_frame(&self) -> Option<Frame> {
        self.staging.lock(|staging| staging.borrow().triggered)
    }

    /// Request transmission of the staged triggered frame. Non-blocking,
    /// callable from interrupt context.
    pub fn trigger_transmit(&self) {
        self.tx_requests.raise(TxRequest::TRIGGERED);
    }

    /// Send a fixed frame on every periodic request.
    pub fn set_periodic_frame(&self, id: u16, payload: &[u8]) {
        let frame = Frame::new_standard(id, payload);
        self.staging
            .lock(|staging| staging.borrow_mut().periodic = PeriodicSource::Fixed(frame));
    }

    /// Send the latest sample to `id` on every periodic request.
    pub fn publish_samples_to(&self, id: u16) {
        self.staging
            .lock(|staging| staging.borrow_mut().periodic = PeriodicSource::Sample { id });
    }

    pub fn periodic_source(&self) -> PeriodicSource {
        self.staging.lock(|staging| staging.borrow().periodic)
    }

    /// Frame the next periodic request will send.
    pub fn periodic_frame(&self) -> Frame {
        match self.periodic_source() {
            PeriodicSource::Sample { id } => {
                Frame::new_standard(id, &self.latest_sample().to_be_bytes())
            }
            PeriodicSource::Fixed(frame) => frame,
        }
    }

    pub fn record_sample(&self, value: u16) {
        self.latest_sample.store(value, Ordering::Release);
    }

    pub fn latest_sample(&self) -> u16 {
        self.latest_sample.load(Ordering::Acquire)
    }

    /// Last value received on the sensor identifier.
    pub fn last_sensor_value(&self) -> Option<u16> {
        self.last_sensor_value.lock(Cell::get)
    }

    //==================================================================================PERIODS
    pub fn set_rx_poll_period(&self, millis: u32) {
        self.rx_poll_period_ms.store(millis, Ordering::Relaxed);
    }

    pub fn rx_poll_period(&self) -> u32 {
        self.rx_poll_period_ms.load(Ordering::Relaxed)
    }

    pub fn set_publish_period(&self, millis: u32) {
        self.publish_period_ms.store(millis, Ordering::Relaxed);
    }

    pub fn publish_period(&self) -> u32 {
        self.publish_period_ms.load(Ordering::Relaxed)
    }

    //==================================================================================BUS
    /// Guarded direct transmit, serialized with the transmit task.
    pub async fn send(&self, frame: &Frame) -> Result<(), BusError> {
        self.bus.send(frame).await
    }

    /// Guarded direct read of the receive mailbox.
    pub async fn receive(&self) -> Frame {
        self.bus.receive().await
    }

    /// Body of the mailbox interrupt handler.
    ///
    /// `regs` is the handler's own register view; only IFLAG1 is touched, so
    /// this never waits on the bus guard. Returns whether a frame arrived.
    pub fn on_interrupt<R: FlexCan + ?Sized>(&self, regs: &mut R) -> bool {
        let received = acknowledge_interrupt(regs);
        if received {
            self.rx_done.raise();
        }
        received
    }

    //==================================================================================ROUTING
    /// Deliver a received frame: the sensor identifier goes to the
    /// built-in path, everything else to the dispatch table.
    ///
    /// Handlers run after the table lock is released and may mutate the
    /// table.
    pub fn route(&self, frame: &Frame) -> Delivery {
        if frame.id == SENSOR_VALUE_ID {
            return self.deliver_sensor_value(frame);
        }

        let handlers: Vec<HandlerRef<'h>, DISPATCH_CAPACITY> = self.table.lock(|table| {
            table
                .borrow()
                .matching(frame.id)
                .map(|entry| entry.handler)
                .collect()
        });

        match dispatch::invoke(handlers, frame) {
            0 => Delivery::Dropped,
            invoked => Delivery::Handlers(invoked),
        }
    }

    fn deliver_sensor_value(&self, frame: &Frame) -> Delivery {
        let [high, low, ..] = frame.data;
        if frame.len < 2 {
            #[cfg(feature = "defmt")]
            defmt::warn!("Sensor frame too short ({} bytes)", frame.len);
            return Delivery::Dropped;
        }
        let value = u16::from_be_bytes([high, low]);

        self.last_sensor_value.lock(|slot| slot.set(Some(value)));
        if let Some(sink) = self.sensor_sink.lock(Cell::get) {
            sink.on_sensor_value(value);
        }
        Delivery::SensorValue(value)
    }
}
