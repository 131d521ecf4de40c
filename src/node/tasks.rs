//! Task bodies of the node. Each `run_*` function loops forever and is
//! meant to be spawned once; [`CanContext::run`] drives all of them
//! concurrently on a single executor task.
//!
//! None of the waits here carry a timeout: a producer that never raises
//! leaves its consumer parked, while the other tasks keep running.
use futures_util::future::join3;

use super::{CanContext, Delivery};
use crate::config::RxMode;
use crate::error::BusError;
use crate::infra::peripheral::FlexCan;
use crate::sync::TxRequest;
use crate::traits::{Sampler, TaskTimer};
use embassy_sync::blocking_mutex::raw::RawMutex;

impl<'h, M: RawMutex, P: FlexCan> CanContext<'h, M, P> {
    //==================================================================================RX
    /// Read the receive mailbox under the guard and route the frame.
    pub async fn service_rx_once(&self) -> Delivery {
        let frame = self.bus.receive().await;
        self.route(&frame)
    }

    /// Interrupt-driven receive: one mailbox read per completion wake-up.
    pub async fn run_rx_interrupt_task(&self) {
        loop {
            self.rx_done.wait().await;
            self.service_rx_once().await;
        }
    }

    /// Polling receive: check the receive flag every poll period.
    pub async fn run_rx_polling_task<T: TaskTimer>(&self, timer: &mut T) {
        loop {
            if let Some(frame) = self.bus.receive_if_pending().await {
                self.route(&frame);
            }
            timer.delay_ms(self.rx_poll_period()).await;
        }
    }

    /// Receive task matching the configured [`RxMode`].
    pub async fn run_rx_task<T: TaskTimer>(&self, timer: &mut T) {
        match self.config.rx_mode {
            RxMode::Interrupt => self.run_rx_interrupt_task().await,
            RxMode::Polling => self.run_rx_polling_task(timer).await,
        }
    }

    //==================================================================================TX
    /// Wait for any transmit request and service every observed flag,
    /// periodic first.
    ///
    /// Returns the requests that reached the bus. A triggered request with
    /// nothing staged is skipped. On a transmit timeout the remaining
    /// requests are still attempted and the first error is returned.
    pub async fn service_tx_requests(&self) -> Result<TxRequest, BusError> {
        let observed = self.tx_requests.wait_any().await;
        let mut sent = TxRequest::empty();
        let mut failure = None;

        for request in observed.service_order() {
            let frame = if request == TxRequest::PERIODIC {
                Some(self.periodic_frame())
            } else {
                self.triggered_frame()
            };

            let Some(frame) = frame else {
                #[cfg(feature = "defmt")]
                defmt::warn!("Triggered transmit requested with no staged frame");
                continue;
            };

            match self.bus.send(&frame).await {
                Ok(()) => sent |= request,
                Err(error) => {
                    failure.get_or_insert(error);
                }
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(sent),
        }
    }

    pub async fn run_tx_task(&self) {
        loop {
            if let Err(_error) = self.service_tx_requests().await {
                #[cfg(feature = "defmt")]
                defmt::error!("Transmit task: {}", _error);
            }
        }
    }

    //==================================================================================SAMPLER
    /// Sample, record and raise the periodic request once per publish period.
    pub async fn run_sampler_task<S: Sampler, T: TaskTimer>(&self, sampler: &mut S, timer: &mut T) {
        loop {
            self.record_sample(sampler.sample());
            self.tx_requests.raise(TxRequest::PERIODIC);
            timer.delay_ms(self.publish_period()).await;
        }
    }

    /// Drive the receive, transmit and sampler tasks concurrently.
    pub async fn run<S, RT, PT>(&self, mut sampler: S, mut rx_timer: RT, mut publish_timer: PT)
    where
        S: Sampler,
        RT: TaskTimer,
        PT: TaskTimer,
    {
        join3(
            self.run_rx_task(&mut rx_timer),
            self.run_tx_task(),
            self.run_sampler_task(&mut sampler, &mut publish_timer),
        )
        .await;
    }
}
