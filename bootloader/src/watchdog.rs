// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

/// Hardware deadman timer.
///
/// Once armed, the device resets unless [`Watchdog::pet`] is called within the
/// timeout. Nothing in the bootloader resets the device by itself: fatal
/// failures stop petting and wait in [`park`].
pub trait Watchdog {
    fn arm(&mut self, timeout_ms: u32);
    fn pet(&mut self);
    /// Stop the countdown before handing control to the application.
    fn disarm(&mut self);
    /// `true` once the deadline has passed.
    ///
    /// On hardware the reset happens first, so this never returns `true`.
    fn expired(&mut self) -> bool;
}

/// Spin without petting until the watchdog fires.
pub fn park(watchdog: &mut impl Watchdog) {
    while !watchdog.expired() {
        core::hint::spin_loop();
    }
}
