// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Anti-rollback guard.
//!
//! Version `0` is a sentinel: it is always accepted and leaves the stored
//! version alone.

use crate::store::{Eeprom, PersistentState};
use core::hint::black_box;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VersionDecision {
    Accept,
    Reject,
}

pub fn check(new: u16, stored: u16) -> VersionDecision {
    if new != 0 && new < stored {
        VersionDecision::Reject
    } else {
        VersionDecision::Accept
    }
}

/// Check `new` against the stored version and persist it when accepted.
///
/// The stored value is read twice and both reads must agree with the
/// decision before anything is written.
pub fn check_and_commit<E: Eeprom>(state: &mut PersistentState<E>, new: u16) -> VersionDecision {
    let cached = state.firmware_version();
    if check(new, state.firmware_version()) == VersionDecision::Reject {
        warn!("rollback from {} to {} refused", cached, new);
        return VersionDecision::Reject;
    }
    if black_box(new) != 0 && black_box(new) < black_box(cached) {
        warn!("stored version changed during check");
        return VersionDecision::Reject;
    }
    if new != 0 {
        state.set_firmware_version(new);
    }
    VersionDecision::Accept
}
