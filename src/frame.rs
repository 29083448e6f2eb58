use crate::error::ChecksumError;

/// Five bytes received in one complete bus transaction:
/// humidity high/low, temperature high/low, checksum.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawFrame(pub [u8; 5]);

/// Temperature and humidity in tenths of their unit.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Temperature in tenths of a degree Celsius (265 is 26.5 °C).
    pub temperature_tenths_c: i16,
    /// Relative humidity in tenths of a percent (528 is 52.8 %RH).
    pub humidity_tenths_pct: u16,
}

impl Measurement {
    /// Temperature in degrees Celsius.
    pub fn temperature_celsius(&self) -> f32 {
        self.temperature_tenths_c as f32 / 10.0
    }

    /// Relative humidity in percent.
    pub fn relative_humidity(&self) -> f32 {
        self.humidity_tenths_pct as f32 / 10.0
    }
}

impl core::fmt::Display for Measurement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let t = self.temperature_tenths_c;
        let sign = if t < 0 { "-" } else { "" };
        let t = t.unsigned_abs();
        let h = self.humidity_tenths_pct;
        write!(f, "{sign}{}.{}°C {}.{}%RH", t / 10, t % 10, h / 10, h % 10)
    }
}

impl RawFrame {
    /// Sum of the four payload bytes, truncated to eight bits.
    pub fn expected_checksum(&self) -> u8 {
        self.0[..4].iter().fold(0u8, |sum, v| sum.wrapping_add(*v))
    }

    /// Checks the checksum byte and decodes the payload.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError`] if the checksum byte does not match the payload.
    pub fn validate(&self) -> Result<Measurement, ChecksumError> {
        let expected = self.expected_checksum();
        let actual = self.0[4];
        if expected != actual {
            return Err(ChecksumError { expected, actual });
        }
        Ok(self.decode())
    }

    fn decode(&self) -> Measurement {
        let [hum_hi, hum_lo, temp_hi, temp_lo, _] = self.0;

        let humidity_tenths_pct = u16::from_be_bytes([hum_hi, hum_lo]);

        // Sign and magnitude, not two's complement
        let is_temp_negative = (temp_hi >> 7) != 0;
        let magnitude = u16::from_be_bytes([temp_hi & 0b0111_1111, temp_lo]) as i16;
        let temperature_tenths_c = if is_temp_negative {
            -magnitude
        } else {
            magnitude
        };

        Measurement {
            temperature_tenths_c,
            humidity_tenths_pct,
        }
    }
}
