//! Microsecond timing: the countdown the driver arms on every phase change,
//! and the table of windows it arms it with.

use crate::am2302::Phase;

/// A countdown timer with microsecond resolution.
pub trait MicroTimer {
    /// Starts a countdown of `us` microseconds from now.
    fn arm(&mut self, us: u32);

    /// Returns `true` once the armed duration has fully elapsed.
    fn expired(&self) -> bool;

    /// Microseconds since the last call to [`arm`](MicroTimer::arm).
    fn elapsed_us(&self) -> u32;
}

/// A free-running microsecond counter.
///
/// The counter is allowed to wrap; only differences between two readings are
/// used.
pub trait MicroClock {
    fn now_us(&self) -> u32;
}

impl<C: MicroClock + ?Sized> MicroClock for &C {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }
}

/// [`MicroTimer`] on top of a [`MicroClock`].
#[derive(Debug)]
pub struct Countdown<C> {
    clock: C,
    start: u32,
    duration: u32,
}

impl<C: MicroClock> Countdown<C> {
    /// Creates a countdown that is already expired.
    pub fn new(clock: C) -> Self {
        let start = clock.now_us();
        Countdown {
            clock,
            start,
            duration: 0,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: MicroClock> MicroTimer for Countdown<C> {
    fn arm(&mut self, us: u32) {
        self.start = self.clock.now_us();
        self.duration = us;
    }

    fn expired(&self) -> bool {
        self.elapsed_us() >= self.duration
    }

    fn elapsed_us(&self) -> u32 {
        // 10 - 4294967290 = 16 on a wrapped u32 counter
        self.clock.now_us().wrapping_sub(self.start)
    }
}

/// Timing window of one phase.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// Deadline armed when the phase is entered.
    pub timeout_us: u32,
    /// Shortest accepted duration of the awaited pulse. Zero disables the check.
    pub min_us: u32,
}

impl Window {
    pub const fn new(timeout_us: u32) -> Self {
        Window {
            timeout_us,
            min_us: 0,
        }
    }

    /// A window for a pulse expected to last up to `timeout_us`, accepting
    /// anything within `tolerance_us` below it.
    pub const fn pulse(timeout_us: u32, tolerance_us: u32) -> Self {
        Window {
            timeout_us,
            min_us: timeout_us.saturating_sub(tolerance_us),
        }
    }
}

/// Timing table for the whole protocol.
///
/// Each entry is the window armed when the driver enters the matching
/// [`Phase`]. Substitute a tuned table for sensor variants or noisy lines
/// with [`Am2302::with_timings`](crate::Am2302::with_timings).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    /// Quiet period between two readings, line released.
    pub sleep: Window,
    /// Host start pulse, line driven low.
    pub request_low: Window,
    /// Line driven high before releasing it to the sensor.
    pub request_high: Window,
    /// Time for the sensor to pull the released line low. Not documented in
    /// the datasheet; verify against the part in use.
    pub wake: Window,
    /// Sensor acknowledgment, low half.
    pub ack_low: Window,
    /// Sensor acknowledgment, high half.
    pub ack_high: Window,
    /// Low pulse preceding every data bit.
    pub bit_start: Window,
    /// High time after which a bit can no longer be a zero.
    pub bit_zero: Window,
    /// Additional high time allowed for a one.
    pub bit_one: Window,
}

impl Timings {
    pub const AM2302: Timings = Timings {
        sleep: Window::new(2_000_000),
        request_low: Window::new(3_200),
        request_high: Window::new(32),
        wake: Window::new(40),
        ack_low: Window::pulse(90, 20),
        ack_high: Window::pulse(90, 20),
        bit_start: Window::new(80),
        bit_zero: Window::new(48),
        bit_one: Window::new(48),
    };

    /// Window armed on entry to `phase`, if the phase waits on a deadline.
    pub fn window(&self, phase: Phase) -> Option<Window> {
        match phase {
            Phase::Sleep => Some(self.sleep),
            Phase::RequestLow => Some(self.request_low),
            Phase::RequestHigh => Some(self.request_high),
            Phase::AwaitAck => Some(self.wake),
            Phase::AwaitAckLow => Some(self.ack_low),
            Phase::AwaitAckHigh => Some(self.ack_high),
            Phase::AwaitBitStart => Some(self.bit_start),
            Phase::SampleBit => Some(self.bit_zero),
            Phase::ConfirmBit => Some(self.bit_one),
            Phase::Idle
            | Phase::StoreBit(_)
            | Phase::Validate
            | Phase::Complete
            | Phase::Error => None,
        }
    }

    /// Checks that every window has a non-zero timeout and a minimum that
    /// fits inside it.
    pub fn is_valid(&self) -> bool {
        let windows = [
            self.sleep,
            self.request_low,
            self.request_high,
            self.wake,
            self.ack_low,
            self.ack_high,
            self.bit_start,
            self.bit_zero,
            self.bit_one,
        ];

        windows
            .iter()
            .all(|w| w.timeout_us > 0 && w.min_us <= w.timeout_us)
    }
}

impl Default for Timings {
    fn default() -> Self {
        Timings::AM2302
    }
}
