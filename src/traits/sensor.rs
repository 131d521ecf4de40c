//! The sampled 16-bit value travels out through the periodic transmit
//! path and comes back in through the reserved sensor identifier.

/// Source of the value published by the periodic transmit request,
/// typically an ADC channel.
pub trait Sampler {
    fn sample(&mut self) -> u16;
}

impl<F: FnMut() -> u16> Sampler for F {
    fn sample(&mut self) -> u16 {
        self()
    }
}

/// Consumer of sensor values received on the reserved identifier, such as
/// a threshold display.
///
/// Called from the receive task, outside of any lock.
pub trait SensorSink {
    fn on_sensor_value(&self, value: u16);
}
