//! Bike computer library - the cycle logic shared by the firmware and the host tests.
//!
//! The binary (`main.rs`) adds the RP2350 peripherals, the sensor drivers and the
//! embassy tasks around it.
//!
//! # Testing
//!
//! Run tests on host with:
//! ```bash
//! cargo test --lib --target x86_64-unknown-linux-gnu
//! ```

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]

pub mod advisory;
pub mod config;
pub mod cycle;
pub mod environment;
pub mod hci;
pub mod motion;
pub mod nextion;
pub mod rolling_average;
pub mod screen;
pub mod system_state;
pub mod wireless;

#[cfg(test)]
mod testing;
