//! AM2302 Sensor Driver for Embedded Rust
//!
//! This crate provides a platform-agnostic, non-blocking driver for the AM2302
//! (DHT22) temperature and humidity sensor, built on top of the [`embedded-hal`]
//! traits.
//!
//! Instead of busy-waiting through the exchange with the sensor, the
//! driver is a state machine advanced by [`Am2302::poll`]. Each call looks at
//! a microsecond timer and the data line, performs at most one step of the
//! protocol and returns immediately, so the sensor can share a main loop with
//! other periodic work. A reading comes out of the call that completes a
//! frame with a valid checksum; failed sessions are retried after the idle
//! period.
//!
//! # Features
//! - Polled, non-blocking API; several sensors can be driven from one loop
//! - Designed for `no_std` environments, no allocation
//! - Tunable timing table ([`Timings`])
//! - Optional logging support via `defmt`
//!
//! # Dependencies
//! This driver needs two things from the platform:
//! - A [`DigitalLine`]: any [`InputPin`] + [`OutputPin`] in open-drain mode can
//!   be wrapped in [`OpenDrain`]
//! - A [`MicroTimer`]: any free-running microsecond counter can be wrapped in
//!   [`Countdown`] through [`MicroClock`]
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` and logs protocol transitions and faults
//! - `serde`: Implements `Serialize`/`Deserialize` for [`Timings`]
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod am2302;
pub mod error;
pub mod frame;
pub mod line;
pub mod reading;
pub mod timing;

#[cfg(test)]
mod sim;

pub use am2302::{Am2302, Phase, Stats};
pub use error::{DhtError, Fault};
pub use line::{DigitalLine, OpenDrain};
pub use reading::Reading;
pub use timing::{Countdown, MicroClock, MicroTimer, Timings, Window};
