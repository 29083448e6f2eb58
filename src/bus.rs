use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, PinState},
};

use crate::error::{BusError, Phase};

/// Failure of a single level wait.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitError<E> {
    /// The line did not reach the expected level in time.
    Timeout,
    /// Error from the GPIO pin.
    Pin(E),
}

impl<E> WaitError<E> {
    /// Attaches the protocol phase the wait belonged to.
    pub fn at(self, phase: Phase) -> BusError<E> {
        match self {
            WaitError::Timeout => BusError::Timeout { phase },
            WaitError::Pin(e) => BusError::Pin(e),
        }
    }
}

/// Measures how long the data line takes to reach a level.
///
/// Only ever reads the pin. Borrows the pin and the microsecond delay for the
/// duration of one bus transaction.
pub struct BusTimingReader<'a, PIN, D> {
    pin: &'a mut PIN,
    delay: &'a mut D,
    step_us: u32,
}

impl<'a, PIN, D, E> BusTimingReader<'a, PIN, D>
where
    PIN: InputPin<Error = E>,
    D: DelayNs,
{
    /// Creates a reader sampling the line every `step_us` microseconds.
    ///
    /// A step of zero is treated as one microsecond.
    pub fn new(pin: &'a mut PIN, delay: &'a mut D, step_us: u32) -> Self {
        Self {
            pin,
            delay,
            step_us: step_us.max(1),
        }
    }

    /// Polls the line until it reads `level`.
    ///
    /// # Returns
    ///
    /// * `Ok(elapsed_us)` - time spent waiting, in whole polling steps
    /// * `Err(WaitError::Timeout)` if `timeout_us` passed without reaching `level`
    pub fn await_level(&mut self, timeout_us: u32, level: PinState) -> Result<u32, WaitError<E>> {
        let mut elapsed = 0;
        while elapsed < timeout_us {
            if self.is_at(level)? {
                return Ok(elapsed);
            }
            self.delay.delay_us(self.step_us);
            elapsed = elapsed.saturating_add(self.step_us);
        }
        Err(WaitError::Timeout)
    }

    fn is_at(&mut self, level: PinState) -> Result<bool, WaitError<E>> {
        let reading = match level {
            PinState::High => self.pin.is_high(),
            PinState::Low => self.pin.is_low(),
        };
        reading.map_err(WaitError::Pin)
    }
}
