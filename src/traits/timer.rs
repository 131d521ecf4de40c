//! Asynchronous delay used by the periodic task bodies.

/// Period source of the polling receive task and the sampler task.
pub trait TaskTimer {
    /// Suspend the calling task for `millis` milliseconds.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`TaskTimer`] backed by the `embassy-time` driver of the firmware.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyTimer;

impl TaskTimer for EmbassyTimer {
    async fn delay_ms(&mut self, millis: u32) {
        embassy_time::Timer::after_millis(millis as u64).await
    }
}
