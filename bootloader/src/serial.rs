// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Blocking serial access that keeps the watchdog fed.

use crate::error::Fault;
use crate::watchdog::Watchdog;
use embedded_io::{Read, ReadReady, Write};
use host_protocol::Ack;

/// A byte-oriented serial line.
pub trait Serial: Read + ReadReady + Write {}

impl<T: Read + ReadReady + Write> Serial for T {}

/// Host serial line paired with the watchdog.
///
/// Every poll and every byte pets the watchdog, so a slow host never causes a
/// reset while a silent one eventually does.
pub struct Link<'a, S, W> {
    serial: &'a mut S,
    watchdog: &'a mut W,
}

impl<'a, S: Serial, W: Watchdog> Link<'a, S, W> {
    pub fn new(serial: &'a mut S, watchdog: &'a mut W) -> Self {
        Self { serial, watchdog }
    }

    /// Busy-wait until at least one byte is available.
    pub fn wait_for_data(&mut self) -> Result<(), Fault> {
        loop {
            self.watchdog.pet();
            match self.serial.read_ready() {
                Ok(true) => return Ok(()),
                Ok(false) => core::hint::spin_loop(),
                Err(_) => return Err(Fault::Truncated),
            }
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, Fault> {
        self.watchdog.pet();
        let mut byte = [0u8; 1];
        match self.serial.read(&mut byte) {
            Ok(1) => {}
            _ => return Err(Fault::Truncated),
        }
        self.watchdog.pet();
        Ok(byte[0])
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Fault> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16, Fault> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Fault> {
        self.serial.write_all(&[byte]).map_err(|_| Fault::Truncated)?;
        self.serial.flush().map_err(|_| Fault::Truncated)
    }

    pub fn ack(&mut self, ack: Ack) -> Result<(), Fault> {
        trace!("ack {}", ack.to_byte());
        self.write_byte(ack.to_byte())
    }

    pub fn watchdog(&mut self) -> &mut W {
        &mut *self.watchdog
    }
}
