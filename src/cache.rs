use core::cell::Cell;

use critical_section::Mutex;

use crate::error::NotYetValid;
use crate::frame::Measurement;

#[derive(Clone, Copy, Default)]
struct State {
    measurement: Measurement,
    valid: bool,
}

/// Last known-good measurement, shared between the sampler and its consumers.
///
/// Starts out invalid. [`ReadingCache::split`] hands out the only
/// [`CacheWriter`] together with a copyable [`CacheReader`]; readers never
/// see a half-written measurement.
///
/// ```
/// use dht22_monitor::{Measurement, ReadingCache};
///
/// let mut cache = ReadingCache::new();
/// let (mut writer, reader) = cache.split();
/// assert!(!reader.is_valid());
///
/// writer.update(Measurement { temperature_tenths_c: 215, humidity_tenths_pct: 480 });
/// assert_eq!(reader.read(), Ok((215, 480)));
/// ```
pub struct ReadingCache {
    state: Mutex<Cell<State>>,
}

impl ReadingCache {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(State {
                measurement: Measurement {
                    temperature_tenths_c: 0,
                    humidity_tenths_pct: 0,
                },
                valid: false,
            })),
        }
    }

    /// Splits the cache into its single writer and a reader.
    pub fn split(&mut self) -> (CacheWriter<'_>, CacheReader<'_>) {
        let cache: &Self = self;
        (CacheWriter { cache }, CacheReader { cache })
    }

    fn load(&self) -> State {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }
}

impl Default for ReadingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Write access to a [`ReadingCache`]. Only one exists per cache.
pub struct CacheWriter<'a> {
    cache: &'a ReadingCache,
}

impl CacheWriter<'_> {
    /// Replaces the cached measurement and marks the cache valid.
    pub fn update(&mut self, measurement: Measurement) {
        critical_section::with(|cs| {
            self.cache.state.borrow(cs).set(State {
                measurement,
                valid: true,
            })
        });
    }

    /// A reader for the cache this writer updates.
    pub fn reader(&self) -> CacheReader<'_> {
        CacheReader { cache: self.cache }
    }
}

/// Read access to a [`ReadingCache`].
#[derive(Clone, Copy)]
pub struct CacheReader<'a> {
    cache: &'a ReadingCache,
}

impl CacheReader<'_> {
    /// Current measurement and whether it came from a verified read.
    pub fn snapshot(&self) -> (Measurement, bool) {
        let state = self.cache.load();
        (state.measurement, state.valid)
    }

    /// Cached `(temperature_tenths_c, humidity_tenths_pct)`.
    ///
    /// # Errors
    ///
    /// Returns [`NotYetValid`] until the first checksum-verified read.
    pub fn read(&self) -> Result<(i16, u16), NotYetValid> {
        match self.snapshot() {
            (m, true) => Ok((m.temperature_tenths_c, m.humidity_tenths_pct)),
            (_, false) => Err(NotYetValid),
        }
    }

    /// Cached temperature, whether or not the cache is valid.
    pub fn get_temperature_tenths(&self) -> i16 {
        self.snapshot().0.temperature_tenths_c
    }

    /// Cached humidity, whether or not the cache is valid.
    pub fn get_humidity_tenths(&self) -> u16 {
        self.snapshot().0.humidity_tenths_pct
    }

    /// `true` once a verified read has been cached. Never reverts.
    pub fn is_valid(&self) -> bool {
        self.snapshot().1
    }
}
