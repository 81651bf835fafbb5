// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Small persistent records kept in EEPROM.

use consts::{EEPROM_FW_SIZE, EEPROM_FW_VERSION, EEPROM_PROVISIONED, PROVISIONED, UNPROVISIONED};

/// Byte-addressed EEPROM. `update_*` only writes cells whose value changes.
/// Words are little-endian.
pub trait Eeprom {
    fn read_byte(&mut self, offset: u16) -> u8;
    fn update_byte(&mut self, offset: u16, value: u8);

    fn read_word(&mut self, offset: u16) -> u16 {
        u16::from_le_bytes([self.read_byte(offset), self.read_byte(offset + 1)])
    }

    fn update_word(&mut self, offset: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.update_byte(offset, lo);
        self.update_byte(offset + 1, hi);
    }
}

/// Typed view of the bootloader records.
pub struct PersistentState<E> {
    eeprom: E,
}

impl<E: Eeprom> PersistentState<E> {
    pub fn new(eeprom: E) -> Self {
        Self { eeprom }
    }

    pub fn firmware_version(&mut self) -> u16 {
        self.eeprom.read_word(EEPROM_FW_VERSION)
    }

    pub fn set_firmware_version(&mut self, version: u16) {
        self.eeprom.update_word(EEPROM_FW_VERSION, version);
    }

    /// Size of the installed image, `0` when nothing is installed.
    pub fn firmware_size(&mut self) -> u16 {
        self.eeprom.read_word(EEPROM_FW_SIZE)
    }

    pub fn set_firmware_size(&mut self, size: u16) {
        self.eeprom.update_word(EEPROM_FW_SIZE, size);
    }

    pub fn provisioned_flag(&mut self) -> u8 {
        self.eeprom.read_byte(EEPROM_PROVISIONED)
    }

    /// Anything but a blank cell counts as provisioned.
    pub fn is_provisioned(&mut self) -> bool {
        self.provisioned_flag() != UNPROVISIONED
    }

    pub fn mark_provisioned(&mut self) {
        self.eeprom.update_byte(EEPROM_PROVISIONED, PROVISIONED);
    }

    pub fn eeprom(&mut self) -> &mut E {
        &mut self.eeprom
    }

    pub fn into_inner(self) -> E {
        self.eeprom
    }
}
