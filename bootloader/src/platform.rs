// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! The set of peripherals the bootloader runs on.

use crate::flash::PageProgrammer;
use crate::hash::Hash256;
use crate::serial::{Link, Serial};
use crate::store::{Eeprom, PersistentState};
use crate::watchdog::Watchdog;

/// Binds the capability traits to concrete peripherals.
pub trait Platform {
    /// Authenticated control and data channel.
    type Host: Serial;
    /// Diagnostic echo line, write only.
    type Debug: embedded_io::Write;
    type Flash: PageProgrammer;
    type Eeprom: Eeprom;
    type Watchdog: Watchdog;
    type Hasher: Hash256;
}

/// Owned peripherals of one boot.
pub struct Board<P: Platform> {
    pub host: P::Host,
    pub debug: P::Debug,
    pub flash: P::Flash,
    pub state: PersistentState<P::Eeprom>,
    pub watchdog: P::Watchdog,
    pub hasher: P::Hasher,
}

impl<P: Platform> Board<P> {
    pub fn new(
        host: P::Host,
        debug: P::Debug,
        flash: P::Flash,
        eeprom: P::Eeprom,
        watchdog: P::Watchdog,
        hasher: P::Hasher,
    ) -> Self {
        Self {
            host,
            debug,
            flash,
            state: PersistentState::new(eeprom),
            watchdog,
            hasher,
        }
    }

    pub fn link(&mut self) -> Link<'_, P::Host, P::Watchdog> {
        Link::new(&mut self.host, &mut self.watchdog)
    }

    /// Write one byte to the debug line. Failures are ignored, the line is
    /// purely informative.
    pub fn echo(&mut self, byte: u8) {
        echo(&mut self.debug, byte);
    }
}

pub(crate) fn echo<D: embedded_io::Write>(debug: &mut D, byte: u8) {
    let _ = debug.write_all(&[byte]);
    let _ = debug.flush();
}
