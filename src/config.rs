/// Timing configuration for the bus transaction and the sampling schedule.
///
/// All bus values are in microseconds, all schedule values in milliseconds.
/// [`Config::DEFAULT`] matches the DHT22 / AM2302 datasheet with generous
/// per-phase timeouts.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// How long the host holds the line low to request a transmission.
    pub start_pulse_us: u32,
    /// How long the host drives the line high before releasing it.
    pub settle_us: u32,
    /// Spacing between two samples of the line while waiting for a level.
    pub poll_step_us: u32,
    /// Upper bound for any single wait during handshake or bit sampling.
    pub phase_timeout_us: u32,
    /// High pulses longer than this encode a `1` bit.
    pub bit_threshold_us: u32,
    /// Bus attempts per sampling cycle.
    pub max_attempts: u8,
    /// Pause between two bus attempts of the same cycle.
    pub retry_delay_ms: u32,
    /// Pause before every sampling cycle.
    pub interval_ms: u32,
    /// Settling time after power-up before the first cycle.
    pub stabilize_ms: u32,
}

impl Config {
    pub const DEFAULT: Self = Self {
        start_pulse_us: 1_100,
        settle_us: 30,
        poll_step_us: 1,
        phase_timeout_us: 2_000,
        bit_threshold_us: 40,
        max_attempts: 3,
        retry_delay_ms: 500,
        interval_ms: 30_000,
        stabilize_ms: 2_000,
    };

    /// Number of level waits in one transaction: three handshake waits plus
    /// a rising and a falling edge for each of the 40 bits.
    pub const WAITS_PER_FRAME: u32 = 3 + 2 * 40;

    /// Worst-case time spent inside the uninterruptible section, reached when
    /// every wait runs into its timeout.
    pub const fn section_bound_us(&self) -> u32 {
        self.start_pulse_us
            .saturating_add(self.settle_us)
            .saturating_add(Self::WAITS_PER_FRAME.saturating_mul(self.phase_timeout_us))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
