//! Polled protocol state machine for the AM2302 single-wire bus.
//!
//! A reading session runs through these phases, each entered with the
//! deadline given by [`Timings::window`]:
//!
//! ```text
//! Idle -> Sleep -> RequestLow -> RequestHigh -> AwaitAck -> AwaitAckLow -> AwaitAckHigh
//!      -> { AwaitBitStart -> SampleBit [-> ConfirmBit] -> StoreBit } x 40
//!      -> Validate -> Complete -> Sleep
//! ```
//!
//! Any fault diverts to `Error`, which releases the line and goes back to
//! `Sleep` without producing a reading.

use embedded_hal::digital::PinState;

use crate::error::{DhtError, Fault};
use crate::frame::{Advance, Bit, Cursor, Frame};
use crate::line::DigitalLine;
use crate::reading::Reading;
use crate::timing::{MicroTimer, Timings};

/// Protocol phase of a driver instance.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Freshly initialized, no deadline armed yet.
    Idle,
    /// Quiet period between readings, line released.
    Sleep,
    /// Host drives the start pulse.
    RequestLow,
    /// Host drives the line high before handing it over.
    RequestHigh,
    /// Waiting for the sensor to pull the line low.
    AwaitAck,
    /// Sensor holds the line low; waiting for release.
    AwaitAckLow,
    /// Sensor holds the line high; waiting for the first bit.
    AwaitAckHigh,
    /// Low pulse that starts every bit; waiting for the rising edge.
    AwaitBitStart,
    /// Line high; a falling edge before the deadline means a zero.
    SampleBit,
    /// Line still high past the zero window; waiting for the falling edge of a one.
    ConfirmBit,
    /// A bit was received and is stored on the next poll.
    StoreBit(Bit),
    /// All 40 bits received.
    Validate,
    /// A reading was delivered.
    Complete,
    /// The session was abandoned.
    Error,
}

/// Session counters since the driver was created.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Sessions that delivered a reading.
    pub readings: u32,
    /// Sessions abandoned because of a [`Fault`].
    pub faults: u32,
}

/// Outcome of one poll.
enum Step {
    Stay,
    Enter(Phase),
    Fail(Fault),
    Deliver(Reading),
}

/// Outcome of waiting for a line level.
enum Wait {
    Pending,
    Reached,
    Expired,
}

/// Non-blocking driver for the AM2302 (DHT22) temperature and humidity sensor.
///
/// Owns the data line, a countdown timer and all session state, so several
/// sensors can be driven side by side from one loop.
pub struct Am2302<L, T> {
    line: L,
    timer: T,
    timings: Timings,
    phase: Phase,
    frame: Frame,
    cursor: Cursor,
    last_fault: Option<Fault>,
    stats: Stats,
}

impl<L, T, E> Am2302<L, T>
where
    L: DigitalLine<Error = E>,
    T: MicroTimer,
{
    /// Creates a driver with the [`Timings::AM2302`] table.
    ///
    /// The line is configured as output and driven to its idle high level.
    pub fn new(line: L, timer: T) -> Result<Self, DhtError<E>> {
        Self::with_timings(line, timer, Timings::AM2302)
    }

    /// Creates a driver with a custom timing table.
    ///
    /// # Errors
    ///
    /// * `DhtError::InvalidTimings` if [`Timings::is_valid`] rejects the table.
    /// * `DhtError::PinError` if the line cannot be configured.
    pub fn with_timings(mut line: L, timer: T, timings: Timings) -> Result<Self, DhtError<E>> {
        if !timings.is_valid() {
            return Err(DhtError::InvalidTimings);
        }
        line.set_output()?;
        line.set_level(PinState::High)?;

        Ok(Am2302 {
            line,
            timer,
            timings,
            phase: Phase::Idle,
            frame: Frame::new(),
            cursor: Cursor::START,
            last_fault: None,
            stats: Stats::default(),
        })
    }

    /// Advances the protocol by at most one phase.
    ///
    /// Call this from the application loop, more often than the shortest
    /// timing window (a few tens of microseconds). It never waits.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Reading))` on the one call where a frame passes its checksum.
    /// * `Ok(None)` otherwise, including when a session is abandoned.
    /// * `Err(DhtError::PinError)` if the line fails. The session is abandoned
    ///   and the next polls recover through the idle period.
    pub fn poll(&mut self) -> Result<Option<Reading>, DhtError<E>> {
        let step = match self.step() {
            Ok(step) => step,
            Err(err) => {
                self.phase = Phase::Error;
                return Err(err);
            }
        };

        match step {
            Step::Stay => Ok(None),
            Step::Enter(phase) => {
                trace!("am2302: {} -> {}", self.phase, phase);
                self.phase = phase;
                Ok(None)
            }
            Step::Fail(fault) => {
                warn!("am2302: session abandoned in {}: {}", self.phase, fault);
                self.last_fault = Some(fault);
                self.stats.faults = self.stats.faults.wrapping_add(1);
                self.phase = Phase::Error;
                Ok(None)
            }
            Step::Deliver(reading) => {
                debug!("am2302: {}", reading);
                self.stats.readings = self.stats.readings.wrapping_add(1);
                self.phase = Phase::Complete;
                Ok(Some(reading))
            }
        }
    }

    /// The transition function: decides the next phase and performs its
    /// side effects on the line, the timer and the frame buffer.
    fn step(&mut self) -> Result<Step, DhtError<E>> {
        let step = match self.phase {
            Phase::Idle => self.enter(Phase::Sleep),

            Phase::Sleep => {
                if !self.timer.expired() {
                    return Ok(Step::Stay);
                }
                self.line.set_output()?;
                self.line.set_level(PinState::Low)?;
                self.enter(Phase::RequestLow)
            }

            Phase::RequestLow => {
                if !self.timer.expired() {
                    return Ok(Step::Stay);
                }
                self.line.set_level(PinState::High)?;
                self.enter(Phase::RequestHigh)
            }

            Phase::RequestHigh => {
                if !self.timer.expired() {
                    return Ok(Step::Stay);
                }
                self.line.set_input()?;
                self.enter(Phase::AwaitAck)
            }

            Phase::AwaitAck => match self.await_level(PinState::Low)? {
                Wait::Pending => Step::Stay,
                Wait::Expired => Step::Fail(Fault::HandshakeTimeout),
                Wait::Reached => self.enter(Phase::AwaitAckLow),
            },

            Phase::AwaitAckLow => match self.await_level(PinState::High)? {
                Wait::Pending => Step::Stay,
                Wait::Expired => Step::Fail(Fault::HandshakeTimeout),
                Wait::Reached if self.pulse_too_short() => {
                    Step::Fail(Fault::HandshakePulseTooShort)
                }
                Wait::Reached => self.enter(Phase::AwaitAckHigh),
            },

            Phase::AwaitAckHigh => match self.await_level(PinState::Low)? {
                Wait::Pending => Step::Stay,
                Wait::Expired => Step::Fail(Fault::HandshakeTimeout),
                Wait::Reached if self.pulse_too_short() => {
                    Step::Fail(Fault::HandshakePulseTooShort)
                }
                Wait::Reached => {
                    self.frame.clear();
                    self.cursor = Cursor::START;
                    self.enter(Phase::AwaitBitStart)
                }
            },

            Phase::AwaitBitStart => match self.await_level(PinState::High)? {
                Wait::Pending => Step::Stay,
                Wait::Expired => Step::Fail(Fault::BitTimeout),
                Wait::Reached => self.enter(Phase::SampleBit),
            },

            Phase::SampleBit => match self.await_level(PinState::Low)? {
                Wait::Pending => Step::Stay,
                Wait::Expired => self.enter(Phase::ConfirmBit),
                Wait::Reached => self.enter(Phase::StoreBit(Bit::Zero)),
            },

            Phase::ConfirmBit => match self.await_level(PinState::Low)? {
                Wait::Pending => Step::Stay,
                Wait::Expired => Step::Fail(Fault::BitTimeout),
                Wait::Reached => self.enter(Phase::StoreBit(Bit::One)),
            },

            Phase::StoreBit(bit) => {
                self.frame.store(self.cursor, bit);
                match self.cursor.advance() {
                    Advance::Next(cursor) => {
                        self.cursor = cursor;
                        self.enter(Phase::AwaitBitStart)
                    }
                    Advance::Complete => self.enter(Phase::Validate),
                }
            }

            Phase::Validate => {
                if self.frame.is_valid() {
                    Step::Deliver(self.frame.reading())
                } else {
                    Step::Fail(Fault::ChecksumMismatch)
                }
            }

            Phase::Complete => self.enter(Phase::Sleep),

            Phase::Error => {
                // a pin fault may have left the line driven
                self.line.set_input()?;
                self.enter(Phase::Sleep)
            }
        };

        Ok(step)
    }

    /// Arms the deadline of `phase`, if it has one.
    fn enter(&mut self, phase: Phase) -> Step {
        if let Some(window) = self.timings.window(phase) {
            self.timer.arm(window.timeout_us);
        }
        Step::Enter(phase)
    }

    /// Checks the deadline before the line, so an edge that shows up on the
    /// poll that finds the deadline passed counts as late.
    fn await_level(&mut self, level: PinState) -> Result<Wait, DhtError<E>> {
        if self.timer.expired() {
            return Ok(Wait::Expired);
        }

        let is_high = self.line.is_high()?;
        if is_high == (level == PinState::High) {
            Ok(Wait::Reached)
        } else {
            Ok(Wait::Pending)
        }
    }

    fn pulse_too_short(&self) -> bool {
        self.timings
            .window(self.phase)
            .is_some_and(|window| self.timer.elapsed_us() < window.min_us)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Why the most recent abandoned session failed, if any did.
    pub fn last_fault(&self) -> Option<Fault> {
        self.last_fault
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Gives back the line and the timer.
    pub fn release(self) -> (L, T) {
        (self.line, self.timer)
    }
}
