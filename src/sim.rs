//! Simulated sensor and clock for end-to-end tests of the polled driver.
//!
//! The simulated sensor replays a [`Response`] waveform whenever the host
//! releases the line, timed against a clock the test advances by hand.

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, PinState};

use crate::am2302::{Am2302, Phase};
use crate::error::Fault;
use crate::frame::FRAME_LEN;
use crate::line::DigitalLine;
use crate::reading::Reading;
use crate::timing::{Countdown, MicroClock};

#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u32>>);

impl SimClock {
    pub fn advance(&self, us: u32) {
        self.0.set(self.0.get().wrapping_add(us));
    }
}

impl MicroClock for SimClock {
    fn now_us(&self) -> u32 {
        self.0.get()
    }
}

/// Line segments the sensor produces after the host releases the line, as
/// `(level, duration_us)`. The pull-up holds the line high afterwards.
#[derive(Clone, Debug)]
pub struct Response {
    pub segments: Vec<(PinState, u32)>,
}

impl Response {
    pub const WAKE: usize = 0;
    pub const ACK_LOW: usize = 1;
    pub const ACK_HIGH: usize = 2;

    /// A sensor that never answers.
    pub fn silent() -> Self {
        Response {
            segments: Vec::new(),
        }
    }

    /// Datasheet timings: 20us until the acknowledgment, 80us low, 80us high,
    /// then 50us low before each bit and 26us (zero) or 70us (one) high.
    pub fn nominal(wire: [u8; FRAME_LEN]) -> Self {
        let mut segments = vec![
            (PinState::High, 20),
            (PinState::Low, 80),
            (PinState::High, 80),
        ];
        for byte in wire {
            for bit in (0..8).rev() {
                let high = if byte & (1 << bit) != 0 { 70 } else { 26 };
                segments.push((PinState::Low, 50));
                segments.push((PinState::High, high));
            }
        }
        segments.push((PinState::Low, 50));

        Response { segments }
    }

    /// Index of the low pulse that starts data bit `n`.
    pub fn bit_low(n: usize) -> usize {
        3 + 2 * n
    }

    /// Index of the high pulse that carries data bit `n`.
    pub fn bit_high(n: usize) -> usize {
        Self::bit_low(n) + 1
    }

    fn level_at(&self, offset: u32) -> PinState {
        let mut start = 0;
        for &(level, duration) in &self.segments {
            if offset < start + duration {
                return level;
            }
            start += duration;
        }
        PinState::High
    }
}

/// Data line with a simulated sensor on the other end.
pub struct SimLine {
    clock: SimClock,
    driving: bool,
    level: PinState,
    released_at: u32,
    responses: VecDeque<Response>,
    current: Response,
    /// Levels driven by the host, with the time they were set.
    pub driven: Vec<(u32, PinState)>,
}

impl SimLine {
    /// Each release of the line plays the next response; the last one repeats.
    pub fn new(clock: SimClock, responses: impl IntoIterator<Item = Response>) -> Self {
        SimLine {
            clock,
            driving: false,
            level: PinState::High,
            released_at: 0,
            responses: responses.into_iter().collect(),
            current: Response::silent(),
            driven: Vec::new(),
        }
    }
}

impl ErrorType for SimLine {
    type Error = Infallible;
}

impl DigitalLine for SimLine {
    fn set_output(&mut self) -> Result<(), Self::Error> {
        self.driving = true;
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), Self::Error> {
        if self.driving {
            self.driving = false;
            self.released_at = self.clock.now_us();
            if self.responses.len() > 1 {
                self.current = self.responses.pop_front().unwrap_or_else(Response::silent);
            } else if let Some(last) = self.responses.front() {
                self.current = last.clone();
            }
        }
        Ok(())
    }

    fn set_level(&mut self, level: PinState) -> Result<(), Self::Error> {
        self.level = level;
        self.driven.push((self.clock.now_us(), level));
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if self.driving {
            return Ok(self.level == PinState::High);
        }
        let offset = self.clock.now_us().wrapping_sub(self.released_at);
        Ok(self.current.level_at(offset) == PinState::High)
    }
}

pub struct Bench {
    pub clock: SimClock,
    pub dht: Am2302<SimLine, Countdown<SimClock>>,
}

impl Bench {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        let clock = SimClock::default();
        let line = SimLine::new(clock.clone(), responses);
        let timer = Countdown::new(clock.clone());
        let dht = Am2302::new(line, timer).unwrap();
        Bench { clock, dht }
    }

    pub fn poll(&mut self) -> Option<Reading> {
        self.dht.poll().unwrap()
    }

    /// Skips the idle period, then polls every `step_us` until the driver is
    /// back in `Sleep`. Returns every reading delivered on the way.
    pub fn session(&mut self, step_us: u32) -> Vec<Reading> {
        let mut readings = Vec::new();
        if self.dht.phase() == Phase::Idle {
            readings.extend(self.poll());
        }
        assert_eq!(self.dht.phase(), Phase::Sleep);
        self.clock.advance(self.dht.timings().sleep.timeout_us);

        for _ in 0..100_000 {
            readings.extend(self.poll());
            if self.dht.phase() == Phase::Sleep {
                return readings;
            }
            self.clock.advance(step_us);
        }
        panic!("session did not return to sleep, stuck in {:?}", self.dht.phase());
    }
}

/// humidity 40.0%, temperature 20.0C
const FRAME: [u8; FRAME_LEN] = [0x01, 0x90, 0x00, 0xC8, 0x59];

#[test]
fn test_valid_frame_delivers_once() {
    let mut bench = Bench::new([Response::nominal(FRAME)]);

    let readings = bench.session(2);

    assert_eq!(
        readings,
        vec![Reading {
            temperature: 200,
            humidity: 400,
        }]
    );
    assert_eq!(bench.dht.phase(), Phase::Sleep);
    assert_eq!(bench.dht.last_fault(), None);
    assert_eq!(bench.dht.stats().readings, 1);
}

#[test]
fn test_start_pulse_timing() {
    let mut bench = Bench::new([Response::nominal(FRAME)]);
    bench.session(1);

    let (line, _) = bench.dht.release();
    let [
        (_, PinState::High),
        (low_at, PinState::Low),
        (high_at, PinState::High),
    ] = line.driven[..]
    else {
        panic!("unexpected host levels {:?}", line.driven);
    };
    assert_eq!(high_at - low_at, 3_200);
}

#[test]
fn test_negative_temperature() {
    // -25.0C, humidity 40.0%
    let mut bench = Bench::new([Response::nominal([0x01, 0x90, 0x80, 0xFA, 0x0B])]);

    assert_eq!(
        bench.session(3),
        vec![Reading {
            temperature: -250,
            humidity: 400,
        }]
    );
}

#[test]
fn test_corrupted_checksum() {
    let mut wire = FRAME;
    wire[4] ^= 0x04;
    let mut bench = Bench::new([Response::nominal(wire)]);

    assert!(bench.session(2).is_empty());
    assert_eq!(bench.dht.phase(), Phase::Sleep);
    assert_eq!(bench.dht.last_fault(), Some(Fault::ChecksumMismatch));
}

#[test]
fn test_no_sensor() {
    let mut bench = Bench::new([Response::silent()]);

    assert!(bench.session(1).is_empty());
    assert_eq!(bench.dht.last_fault(), Some(Fault::HandshakeTimeout));
}

/// Stretches one segment to one microsecond past the window that waits for
/// its end, and expects the session to be abandoned with `fault`.
fn assert_late_edge(segment: usize, us: u32, fault: Fault) {
    let mut response = Response::nominal(FRAME);
    response.segments[segment].1 = us;
    let mut bench = Bench::new([response]);

    assert!(bench.session(1).is_empty(), "segment {segment}");
    assert_eq!(bench.dht.last_fault(), Some(fault), "segment {segment}");
    assert_eq!(bench.dht.stats().readings, 0);
}

#[test]
fn test_late_edges_time_out() {
    assert_late_edge(Response::WAKE, 41, Fault::HandshakeTimeout);
    assert_late_edge(Response::ACK_LOW, 91, Fault::HandshakeTimeout);
    assert_late_edge(Response::ACK_HIGH, 91, Fault::HandshakeTimeout);
    assert_late_edge(Response::bit_low(0), 81, Fault::BitTimeout);
    // a one may stay high for 48 + 48us
    assert_late_edge(Response::bit_high(0), 97, Fault::BitTimeout);
    assert_late_edge(Response::bit_high(39), 97, Fault::BitTimeout);
}

#[test]
fn test_edge_on_deadline_is_late() {
    assert_late_edge(Response::WAKE, 40, Fault::HandshakeTimeout);
    assert_late_edge(Response::ACK_LOW, 90, Fault::HandshakeTimeout);
}

#[test]
fn test_short_acknowledgment() {
    assert_late_edge(Response::ACK_LOW, 60, Fault::HandshakePulseTooShort);
    assert_late_edge(Response::ACK_HIGH, 60, Fault::HandshakePulseTooShort);
}

#[test]
fn test_recovers_after_fault() {
    let mut bench = Bench::new([Response::silent(), Response::nominal(FRAME)]);

    assert!(bench.session(2).is_empty());
    assert_eq!(bench.session(2).len(), 1);
    assert_eq!(bench.session(2).len(), 1);
    assert_eq!(bench.dht.stats().faults, 1);
    assert_eq!(bench.dht.stats().readings, 2);
}

#[test]
fn test_sleep_waits_full_idle_period() {
    let mut bench = Bench::new([Response::nominal(FRAME)]);
    bench.poll();

    for _ in 0..1_000 {
        bench.clock.advance(1_999);
        assert_eq!(bench.poll(), None);
        assert_eq!(bench.dht.phase(), Phase::Sleep);
    }
    bench.clock.advance(1_000);
    bench.poll();
    assert_eq!(bench.dht.phase(), Phase::RequestLow);
}

#[test]
fn test_independent_instances() {
    let mut first = Bench::new([Response::nominal(FRAME)]);
    let mut second = Bench::new([Response::nominal([0x02, 0x2B, 0x00, 0xF6, 0x23])]);

    first.poll();
    second.poll();
    first.clock.advance(2_000_000);
    second.clock.advance(2_000_000);

    let mut readings = (Vec::new(), Vec::new());
    for _ in 0..20_000 {
        readings.0.extend(first.poll());
        readings.1.extend(second.poll());
        first.clock.advance(2);
        second.clock.advance(3);
    }

    assert_eq!(readings.0, vec![Reading { temperature: 200, humidity: 400 }]);
    assert_eq!(readings.1, vec![Reading { temperature: 246, humidity: 555 }]);
}
