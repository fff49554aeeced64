//! Frame assembly and validation.
//!
//! The sensor transmits 40 bits MSB first: humidity high, humidity low,
//! temperature high, temperature low, checksum. The frame buffer keeps the
//! two 16-bit words little-endian, so each received byte is routed through
//! [`BYTE_ORDER`] before it is stored.

use crate::reading::Reading;

/// Number of bytes in a frame, checksum included.
pub const FRAME_LEN: usize = 5;

/// Buffer slot for each transmitted byte.
///
/// Buffer layout: humidity low, humidity high, temperature low,
/// temperature high (with sign bit), checksum.
pub const BYTE_ORDER: [usize; FRAME_LEN] = [1, 0, 3, 2, 4];

/// Value of one received bit.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bit {
    Zero,
    One,
}

/// Position of the next bit to receive, in transmission order.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    byte: u8,
    bit: u8,
}

/// Result of moving the cursor past a stored bit.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// More bits are expected at the given position.
    Next(Cursor),
    /// All 40 bits have been received.
    Complete,
}

impl Cursor {
    /// MSB of the first transmitted byte.
    pub const START: Cursor = Cursor { byte: 0, bit: 7 };

    /// Index of the byte being received, in transmission order (0..=4).
    pub fn byte(&self) -> u8 {
        self.byte
    }

    /// Bit position within the current byte (7..=0).
    pub fn bit(&self) -> u8 {
        self.bit
    }

    pub fn advance(self) -> Advance {
        if self.bit > 0 {
            return Advance::Next(Cursor {
                byte: self.byte,
                bit: self.bit - 1,
            });
        }

        let byte = self.byte + 1;
        if byte as usize >= FRAME_LEN {
            Advance::Complete
        } else {
            Advance::Next(Cursor { byte, bit: 7 })
        }
    }
}

/// Frame buffer in storage order.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    pub const fn new() -> Self {
        Frame {
            bytes: [0; FRAME_LEN],
        }
    }

    /// Builds a frame from bytes in the order the sensor sends them.
    pub fn from_wire(wire: [u8; FRAME_LEN]) -> Self {
        let mut frame = Frame::new();
        for (sent, byte) in wire.into_iter().enumerate() {
            frame.bytes[BYTE_ORDER[sent]] = byte;
        }
        frame
    }

    pub fn clear(&mut self) {
        self.bytes = [0; FRAME_LEN];
    }

    /// Records `bit` at `cursor`.
    ///
    /// Zero bits need no write since the buffer is cleared at the start of
    /// every session.
    pub fn store(&mut self, cursor: Cursor, bit: Bit) {
        if bit == Bit::One {
            self.bytes[BYTE_ORDER[cursor.byte as usize]] |= 1 << cursor.bit;
        }
    }

    /// Raw buffer in storage order.
    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn humidity_word(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn temperature_word(&self) -> u16 {
        u16::from_le_bytes([self.bytes[2], self.bytes[3]])
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[4]
    }

    pub fn is_valid(&self) -> bool {
        let [a, b, c, d, checksum] = self.bytes;
        checksum_matches([a, b, c, d], checksum)
    }

    /// Decodes the payload, without checking the checksum.
    pub fn reading(&self) -> Reading {
        Reading::decode(self.humidity_word(), self.temperature_word())
    }
}

/// Sums the payload bytes modulo 256 and compares against `checksum`.
pub fn checksum_matches(payload: [u8; 4], checksum: u8) -> bool {
    payload.iter().fold(0u8, |sum, v| sum.wrapping_add(*v)) == checksum
}
