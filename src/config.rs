//! Driver configuration: bit-timing presets, receive strategy, task periods
//! and the spin budgets of the hardware polling loops.

/// Bit-timing presets for an 8 MHz oscillator clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSpeed {
    Kbps500,
    Kbps250,
    Kbps100,
    Kbps50,
}

impl BusSpeed {
    /// CTRL1 value (prescaler, segments, jump width) for the preset.
    pub const fn ctrl1(&self) -> u32 {
        match self {
            BusSpeed::Kbps500 => 0x00DB_0006,
            BusSpeed::Kbps250 => 0x01DB_0006,
            BusSpeed::Kbps100 => 0x04DB_0006,
            BusSpeed::Kbps50 => 0x09DB_0006,
        }
    }

    pub const fn to_bps(&self) -> u32 {
        match self {
            BusSpeed::Kbps500 => 500_000,
            BusSpeed::Kbps250 => 250_000,
            BusSpeed::Kbps100 => 100_000,
            BusSpeed::Kbps50 => 50_000,
        }
    }
}

/// How the receive task learns that the receive mailbox is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxMode {
    /// Wait on the completion signal raised by the mailbox interrupt.
    ///
    /// Frames arriving faster than the task drains them coalesce into one
    /// wake-up and the older ones are lost.
    Interrupt,
    /// Check the receive flag every `rx_poll_period_ms`.
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub speed: BusSpeed,
    pub rx_mode: RxMode,
    /// Period of the polling receive task.
    pub rx_poll_period_ms: u32,
    /// Period of the sampler that raises the periodic transmit request.
    pub publish_period_ms: u32,
    /// Status reads allowed per bring-up wait before giving up.
    pub init_spin_limit: u32,
    /// Status reads allowed while waiting for transmit completion.
    pub tx_spin_limit: u32,
}

impl Config {
    pub const DEFAULT: Config = Config {
        speed: BusSpeed::Kbps500,
        rx_mode: RxMode::Interrupt,
        rx_poll_period_ms: 100,
        publish_period_ms: 1000,
        init_spin_limit: 100_000,
        tx_spin_limit: 100_000,
    };

    pub const fn with_speed(mut self, speed: BusSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub const fn with_rx_mode(mut self, rx_mode: RxMode) -> Self {
        self.rx_mode = rx_mode;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
