use core::fmt;

/// Reasons a reading session was abandoned.
///
/// Faults never cross [`Am2302::poll`](crate::Am2302::poll): the session is
/// dropped and retried after the idle period. The most recent one is kept for
/// diagnostics, see [`Am2302::last_fault`](crate::Am2302::last_fault).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The sensor did not produce an acknowledgment edge in time.
    HandshakeTimeout,
    /// An acknowledgment pulse was shorter than its window allows.
    HandshakePulseTooShort,
    /// No edge was observed within the per-bit budget.
    BitTimeout,
    /// The checksum byte did not match the sum of the payload bytes.
    ChecksumMismatch,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::HandshakeTimeout => f.write_str("timed out waiting for sensor acknowledgment"),
            Fault::HandshakePulseTooShort => f.write_str("acknowledgment pulse too short"),
            Fault::BitTimeout => f.write_str("timed out waiting for a data bit edge"),
            Fault::ChecksumMismatch => f.write_str("checksum did not match the received data"),
        }
    }
}

/// Possible errors from the AM2302 driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum DhtError<E> {
    /// A timing window has a zero timeout or a minimum above its timeout.
    InvalidTimings,
    /// Error from the GPIO pin (input/output).
    PinError(E),
}

impl<E> From<E> for DhtError<E> {
    fn from(value: E) -> Self {
        Self::PinError(value)
    }
}

impl<E: fmt::Debug> fmt::Display for DhtError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhtError::InvalidTimings => f.write_str("inconsistent timing table"),
            DhtError::PinError(err) => write!(f, "HAL pin error: {err:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for DhtError<E> {}
