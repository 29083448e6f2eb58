use thiserror::Error;

/// Step of the bus transaction where a wait ran out of time.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// One of the three handshake waits (0: ack low, 1: ack high, 2: data start low).
    Handshake(u8),
    /// One of the 40 data bits, counted from the most significant bit of the frame.
    Bit(u8),
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Phase::Handshake(n) => write!(f, "handshake {n}"),
            Phase::Bit(i) => write!(f, "bit {i}"),
        }
    }
}

/// A bus transaction that did not produce a complete frame.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError<E> {
    /// Timed out waiting for the line to reach the expected level.
    #[error("timed out at {phase}")]
    Timeout { phase: Phase },
    /// Error from the GPIO pin (input/output).
    #[error("pin error: {0:?}")]
    Pin(E),
}

impl<E> From<E> for BusError<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}

/// A complete frame whose checksum byte did not match its payload.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
pub struct ChecksumError {
    /// Low byte of the sum of the four payload bytes.
    pub expected: u8,
    /// Checksum byte sent by the sensor.
    pub actual: u8,
}

/// No checksum-verified reading has been cached yet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("no valid reading yet")]
pub struct NotYetValid;
