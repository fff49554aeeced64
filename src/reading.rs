/// Bit 15 of the raw temperature word carries the sign.
const SIGN_MASK: u16 = 0x8000;

/// Reading returned by the AM2302 sensor.
///
/// Both fields are fixed point with 0.1 resolution, as transmitted by the
/// sensor. A temperature of -4.5°C is stored as `-45`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reading {
    /// Temperature in tenths of a degree Celsius.
    pub temperature: i16,
    /// Relative humidity in tenths of a percent.
    pub humidity: u16,
}

impl Reading {
    /// Decodes the two 16-bit words of a frame.
    ///
    /// The temperature word is sign-magnitude: the low 15 bits are the
    /// magnitude, bit 15 negates it.
    pub fn decode(raw_humidity: u16, raw_temperature: u16) -> Self {
        let magnitude = (raw_temperature & !SIGN_MASK) as i16;
        let temperature = if raw_temperature & SIGN_MASK != 0 {
            -magnitude
        } else {
            magnitude
        };

        Reading {
            temperature,
            humidity: raw_humidity,
        }
    }

    /// Temperature in degrees Celsius.
    pub fn temperature_celsius(&self) -> f32 {
        self.temperature as f32 / 10.0
    }

    /// Relative humidity in percent.
    pub fn relative_humidity(&self) -> f32 {
        self.humidity as f32 / 10.0
    }
}
