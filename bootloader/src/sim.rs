// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! RAM-backed peripherals for running the bootloader on a host.
//!
//! Serial lines are either scripted (all host bytes known up front) or piped
//! to a [`HostEnd`] that another thread drives with `std::io`.

use crate::flash::PageProgrammer;
use crate::hash::Sha256;
use crate::platform::{Board, Platform};
use crate::store::Eeprom;
use crate::watchdog::Watchdog;
use consts::{FLASH_SIZE, PAGE_SIZE};
use core::convert::Infallible;
use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};
use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// Flash erased to `0xFF`, programmed through a word-wide page buffer.
pub struct SimFlash {
    data: Vec<u8>,
    page_buffer: [u16; PAGE_SIZE / 2],
    fills: Vec<(u32, u16)>,
    commits: Vec<u32>,
    rww: bool,
    faulty: bool,
}

impl Default for SimFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFlash {
    pub fn new() -> Self {
        Self {
            data: vec![0xff; FLASH_SIZE as usize],
            page_buffer: [0xffff; PAGE_SIZE / 2],
            fills: Vec::new(),
            commits: Vec::new(),
            rww: true,
            faulty: false,
        }
    }

    /// Write raw bytes, bypassing the programmer.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) {
        let start = addr as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn page(&self, addr: u32) -> &[u8] {
        &self.data[addr as usize..addr as usize + PAGE_SIZE]
    }

    /// Every `fill_word` call, in order.
    pub fn fills(&self) -> &[(u32, u16)] {
        &self.fills
    }

    /// Addresses of committed pages, in order.
    pub fn commits(&self) -> &[u32] {
        &self.commits
    }

    /// Make every following commit fail.
    pub fn set_faulty(&mut self, faulty: bool) {
        self.faulty = faulty;
    }

    fn check_page(&self, addr: u32) -> Result<usize, NorFlashErrorKind> {
        let start = addr as usize;
        if start % PAGE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if start + PAGE_SIZE > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(start)
    }
}

impl ErrorType for SimFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for SimFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if !self.rww {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(NorFlashErrorKind::OutOfBounds)?;
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl PageProgrammer for SimFlash {
    fn erase_page(&mut self, addr: u32) -> Result<(), Self::Error> {
        let start = self.check_page(addr)?;
        self.data[start..start + PAGE_SIZE].fill(0xff);
        self.rww = false;
        Ok(())
    }

    fn fill_word(&mut self, addr: u32, word: u16) -> Result<(), Self::Error> {
        if addr % 2 != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.page_buffer[(addr as usize % PAGE_SIZE) / 2] = word;
        self.fills.push((addr, word));
        Ok(())
    }

    fn commit_page(&mut self, addr: u32) -> Result<(), Self::Error> {
        let start = self.check_page(addr)?;
        if self.faulty {
            return Err(NorFlashErrorKind::Other);
        }
        for (i, word) in self.page_buffer.iter().enumerate() {
            self.data[start + 2 * i..start + 2 * i + 2].copy_from_slice(&word.to_le_bytes());
        }
        self.page_buffer = [0xffff; PAGE_SIZE / 2];
        self.commits.push(addr);
        self.rww = false;
        Ok(())
    }

    fn enable_rww(&mut self) -> Result<(), Self::Error> {
        self.rww = true;
        Ok(())
    }
}

/// EEPROM erased to `0xFF`.
pub struct SimEeprom {
    data: Vec<u8>,
}

impl Default for SimEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEeprom {
    pub const SIZE: usize = 1024;

    pub fn new() -> Self {
        Self {
            data: vec![0xff; Self::SIZE],
        }
    }
}

impl Eeprom for SimEeprom {
    fn read_byte(&mut self, offset: u16) -> u8 {
        self.data.get(offset as usize).copied().unwrap_or(0xff)
    }

    fn update_byte(&mut self, offset: u16, value: u8) {
        if let Some(cell) = self.data.get_mut(offset as usize) {
            *cell = value;
        }
    }
}

/// Device side of a serial line.
///
/// A scripted line reports end of stream once its input is used up. A piped
/// line does so when the [`HostEnd`] is dropped.
pub struct SimSerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
    stalls: usize,
    rx: Option<Receiver<u8>>,
    tx: Option<Sender<u8>>,
}

impl SimSerial {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
            stalls: 0,
            rx: None,
            tx: None,
        }
    }

    /// Report "no data" for the next `polls` readiness checks.
    pub fn with_stalls(mut self, polls: usize) -> Self {
        self.stalls = polls;
        self
    }

    /// Everything the device wrote.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

/// Host side of a piped serial line.
pub struct HostEnd {
    rx: Receiver<u8>,
    tx: Sender<u8>,
}

/// A serial line whose host side is driven through `std::io`.
pub fn pipe() -> (SimSerial, HostEnd) {
    let (to_device, from_host) = channel();
    let (to_host, from_device) = channel();
    let device = SimSerial {
        input: VecDeque::new(),
        output: Vec::new(),
        stalls: 0,
        rx: Some(from_host),
        tx: Some(to_host),
    };
    let host = HostEnd {
        rx: from_device,
        tx: to_device,
    };
    (device, host)
}

impl embedded_io::ErrorType for SimSerial {
    type Error = Infallible;
}

impl embedded_io::ReadReady for SimSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.stalls > 0 {
            self.stalls -= 1;
            return Ok(false);
        }
        if !self.input.is_empty() {
            return Ok(true);
        }
        match self.rx.as_ref().map(Receiver::try_recv) {
            Some(Ok(byte)) => {
                self.input.push_back(byte);
                Ok(true)
            }
            Some(Err(TryRecvError::Empty)) => {
                std::thread::yield_now();
                Ok(false)
            }
            Some(Err(TryRecvError::Disconnected)) | None => Ok(true),
        }
    }
}

impl embedded_io::Read for SimSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.input.is_empty() {
            if let Some(byte) = self.rx.as_ref().and_then(|rx| rx.recv().ok()) {
                self.input.push_back(byte);
            }
        }
        let mut n = 0;
        while n < buf.len() {
            match self.input.pop_front() {
                Some(byte) => buf[n] = byte,
                None => break,
            }
            n += 1;
        }
        Ok(n)
    }
}

impl embedded_io::Write for SimSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        if let Some(tx) = &self.tx {
            for byte in buf {
                let _ = tx.send(*byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl std::io::Read for HostEnd {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.rx.recv() {
            Ok(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            Err(_) => Ok(0),
        }
    }
}

impl std::io::Write for HostEnd {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for byte in buf {
            self.tx
                .send(*byte)
                .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Write-only capture of the debug line.
#[derive(Debug, Default)]
pub struct SimLine {
    output: Vec<u8>,
}

impl SimLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

impl embedded_io::ErrorType for SimLine {
    type Error = Infallible;
}

impl embedded_io::Write for SimLine {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Watchdog counting in polls instead of milliseconds: it expires after
/// `timeout` consecutive `expired()` checks without a pet.
#[derive(Debug, Default)]
pub struct SimWatchdog {
    timeout: Option<u32>,
    idle: u32,
    pets: usize,
    fired: bool,
}

impl SimWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pets(&self) -> usize {
        self.pets
    }

    pub fn is_armed(&self) -> bool {
        self.timeout.is_some()
    }

    /// `true` once the countdown ran out, i.e. the device would have reset.
    pub fn fired(&self) -> bool {
        self.fired
    }
}

impl Watchdog for SimWatchdog {
    fn arm(&mut self, timeout_ms: u32) {
        self.timeout = Some(timeout_ms);
        self.idle = 0;
    }

    fn pet(&mut self) {
        self.idle = 0;
        self.pets += 1;
    }

    fn disarm(&mut self) {
        self.timeout = None;
    }

    fn expired(&mut self) -> bool {
        let Some(timeout) = self.timeout else {
            panic!("waiting for a disarmed watchdog");
        };
        self.idle += 1;
        if self.idle >= timeout {
            self.fired = true;
        }
        self.fired
    }
}

/// The simulated platform.
pub struct Sim;

impl Platform for Sim {
    type Host = SimSerial;
    type Debug = SimLine;
    type Flash = SimFlash;
    type Eeprom = SimEeprom;
    type Watchdog = SimWatchdog;
    type Hasher = Sha256;
}

impl Board<Sim> {
    /// Blank flash and EEPROM, with `host` as the host line.
    pub fn sim(host: SimSerial) -> Self {
        Board::new(
            host,
            SimLine::new(),
            SimFlash::new(),
            SimEeprom::new(),
            SimWatchdog::new(),
            Sha256,
        )
    }
}
