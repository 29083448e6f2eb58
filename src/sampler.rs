use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::{info, warn};

use crate::cache::CacheWriter;
use crate::decoder::{FrameDecoder, Uninterruptible};
use crate::error::{BusError, ChecksumError};
use crate::frame::Measurement;

/// How one sampling cycle ended.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome<E> {
    /// A verified measurement was written to the cache.
    Success {
        measurement: Measurement,
        attempts: u8,
    },
    /// Every bus attempt failed. The cache was left untouched.
    BusFailed { attempts: u8, last: BusError<E> },
    /// A complete frame failed verification. The cache was left untouched.
    ChecksumFailed(ChecksumError),
}

/// Periodically reads the sensor and keeps the cache at the last good value.
///
/// Bus errors are retried within a cycle, spaced by
/// [`Config::retry_delay_ms`](crate::Config::retry_delay_ms). A checksum
/// mismatch ends the cycle at once and waits for the next one.
pub struct PeriodicSampler<'a, PIN, D, S, W> {
    decoder: FrameDecoder<PIN, D, S>,
    sleep: W,
    writer: CacheWriter<'a>,
}

impl<'a, PIN, D, S, W, E> PeriodicSampler<'a, PIN, D, S, W>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
    S: Uninterruptible,
    W: DelayNs,
    E: core::fmt::Debug,
{
    /// Creates a sampler without touching the bus.
    ///
    /// # Arguments
    ///
    /// * `decoder` - Frame decoder owning the data line.
    /// * `sleep` - Coarse delay used for the interval and retry waits.
    /// * `writer` - The cache's only writer.
    pub fn new(decoder: FrameDecoder<PIN, D, S>, sleep: W, writer: CacheWriter<'a>) -> Self {
        Self {
            decoder,
            sleep,
            writer,
        }
    }

    /// Releases the data line and waits for the sensor to stabilise.
    ///
    /// The returned sampler is ready for [`run`](Self::run).
    pub fn init(
        decoder: FrameDecoder<PIN, D, S>,
        sleep: W,
        writer: CacheWriter<'a>,
    ) -> Result<Self, E> {
        let mut sampler = Self::new(decoder, sleep, writer);
        sampler.decoder.release()?;
        let stabilize_ms = sampler.decoder.config().stabilize_ms;
        sampler.sleep.delay_ms(stabilize_ms);
        info!(
            "DHT22 initialized, sampling every {} ms",
            sampler.decoder.config().interval_ms
        );
        Ok(sampler)
    }

    /// Samples forever, one cycle per interval.
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
        }
    }

    /// Sleeps for one interval, then runs a cycle.
    pub fn tick(&mut self) -> CycleOutcome<E> {
        let interval_ms = self.decoder.config().interval_ms;
        self.sleep.delay_ms(interval_ms);
        self.run_cycle()
    }

    /// Runs one sampling cycle immediately.
    pub fn run_cycle(&mut self) -> CycleOutcome<E> {
        let config = *self.decoder.config();
        let max_attempts = config.max_attempts.max(1);

        let mut attempt = 1;
        let frame = loop {
            match self.decoder.decode() {
                Ok(frame) => break frame,
                Err(e) if attempt >= max_attempts => {
                    warn!("Failed to read DHT22 after {} attempts: {}", attempt, e);
                    return CycleOutcome::BusFailed {
                        attempts: attempt,
                        last: e,
                    };
                }
                Err(e) => {
                    warn!("Retry {}/{} after {}", attempt, max_attempts, e);
                    self.sleep.delay_ms(config.retry_delay_ms);
                    attempt += 1;
                }
            }
        };

        match frame.validate() {
            Ok(measurement) => {
                self.writer.update(measurement);
                info!("Measurement: {}", measurement);
                CycleOutcome::Success {
                    measurement,
                    attempts: attempt,
                }
            }
            Err(e) => {
                // Keep the last valid reading
                warn!("Checksum error: {}", e);
                CycleOutcome::ChecksumFailed(e)
            }
        }
    }
}
