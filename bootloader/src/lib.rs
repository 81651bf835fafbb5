// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secure field-update bootloader.
//!
//! At cold boot the mode-select jumpers are sampled once and exactly one
//! activity runs for the power cycle: enrollment of the device credential,
//! an authenticated firmware update, a password-gated flash readback, or the
//! handoff to the installed application. Every failure is terminal: the
//! bootloader reports a single diagnostic byte and waits for the watchdog to
//! reset the device.
//!
//! All hardware is reached through the traits in [`platform`], so the engine
//! runs unchanged on the target and on a host (see the `sim` feature).

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

#[macro_use]
mod fmt;

pub mod auth;
pub mod boot;
pub mod cipher;
pub mod error;
pub mod flash;
pub mod frame;
pub mod hash;
pub mod platform;
pub mod readback;
pub mod serial;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod store;
pub mod update;
pub mod verify;
pub mod version;
pub mod watchdog;

#[cfg(test)]
mod tests;

pub use boot::{BootMode, Bootloader, ModeInputs, ModeSelect, Terminal};
pub use error::{Fault, FaultClass};
pub use platform::{Board, Platform};
