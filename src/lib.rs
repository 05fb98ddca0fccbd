//! Platform-agnostic Rust driver for the stackable 8-channel RTD data
//! acquisition card.
//!
//! ```ignore
//! use core::cell::RefCell;
//! use megartd::MegaRtd;
//!
//! let bus = RefCell::new(i2c);
//! let mut rtd = MegaRtd::new(&bus);
//! let celsius = rtd.get_temperature_poly5(0, 1)?;
//! ```
//!
//! On Linux, enable the `linux` feature and use `bus::LinuxBus`, which
//! opens the `i2c-dev` node for each reading.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod bus;
pub mod curve;
pub mod rtd;
pub mod wdt;

pub use crate::bus::Bus;
pub use crate::rtd::{Error, MegaRtd};
