//! DHT22 sampling core for Embedded Rust
//!
//! This crate reads a DHT22 (AM2302) temperature and humidity sensor over its
//! single-wire protocol and keeps the last checksum-verified reading for other
//! tasks to consume, built on top of the [`embedded-hal`] traits.
//!
//! # Features
//! - Frame decoding from microsecond edge timings inside a critical section
//! - Bounded retries for bus timeouts, no retries for checksum mismatches
//! - A reading cache that never forgets its last good value
//! - Designed for `no_std` environments
//!
//! # Dependencies
//! This crate depends on the following `embedded-hal` traits:
//! - [`InputPin`] and [`OutputPin`] for GPIO access on an open-drain pin
//! - [`DelayNs`] for microsecond polling and coarse sleeps
//!
//! The uninterruptible section and the cache use the [`critical-section`]
//! implementation of the target platform. Runtime events are logged through
//! the [`log`] facade.
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` for logging support
//!
//! # Usage
//!
//! ```ignore
//! let mut cache = ReadingCache::new();
//! let (writer, reader) = cache.split();
//!
//! let decoder = FrameDecoder::new(pin, us_delay, Config::DEFAULT);
//! let mut sampler = PeriodicSampler::init(decoder, ms_delay, writer)?;
//!
//! // in the sampler task
//! sampler.run();
//!
//! // in the display task
//! if let Ok((temperature, humidity)) = reader.read() { /* ... */ }
//! ```
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`critical-section`]: https://docs.rs/critical-section
//! [`log`]: https://docs.rs/log
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod sampler;

pub use bus::BusTimingReader;
pub use cache::{CacheReader, CacheWriter, ReadingCache};
pub use config::Config;
pub use decoder::{CriticalSection, FrameDecoder, Uninterruptible};
pub use error::{BusError, ChecksumError, NotYetValid, Phase};
pub use frame::{Measurement, RawFrame};
pub use sampler::{CycleOutcome, PeriodicSampler};
