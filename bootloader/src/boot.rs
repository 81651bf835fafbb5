// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Boot-mode dispatch.

use crate::auth;
use crate::error::Fault;
use crate::flash;
use crate::platform::{echo, Board, Platform};
use crate::readback::{readback, ReadbackReport};
use crate::update::{update, UpdateReport};
use crate::watchdog::{park, Watchdog};
use consts::{APP_ENTRY, APP_REGION_SIZE, FLASH_SIZE, WATCHDOG_TIMEOUT_MS};
use host_protocol::Mode;

/// Level of the mode-select jumpers at reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeInputs {
    /// Firmware-load jumper
    pub load: bool,
    /// Readback jumper
    pub readback: bool,
}

/// Samples the mode-select jumpers. Called once per boot.
pub trait ModeSelect {
    fn sample(&mut self) -> ModeInputs;
}

impl ModeSelect for ModeInputs {
    fn sample(&mut self) -> ModeInputs {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootMode {
    Enrollment,
    Update,
    Readback,
    BootJump,
}

impl BootMode {
    pub fn banner(self) -> u8 {
        match self {
            BootMode::Enrollment => Mode::Enrollment,
            BootMode::Update => Mode::Update,
            BootMode::Readback => Mode::Readback,
            BootMode::BootJump => Mode::Boot,
        }
        .banner()
    }
}

/// Enrollment takes precedence over the jumpers, then load, then readback.
pub fn select(provisioned: bool, inputs: ModeInputs) -> BootMode {
    if !provisioned {
        BootMode::Enrollment
    } else if inputs.load {
        BootMode::Update
    } else if inputs.readback {
        BootMode::Readback
    } else {
        BootMode::BootJump
    }
}

/// How a boot ended.
///
/// Every variant but `Boot` is reached after the watchdog expired, which on
/// hardware means the device has already been reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Terminal {
    Updated(UpdateReport),
    ReadbackDone(ReadbackReport),
    Enrolled,
    Halted(Fault),
    /// Hand control to the application at `entry`.
    Boot { entry: u32 },
}

pub struct Bootloader<P: Platform> {
    board: Board<P>,
}

impl<P: Platform> Bootloader<P> {
    pub fn new(board: Board<P>) -> Self {
        Self { board }
    }

    pub fn into_board(self) -> Board<P> {
        self.board
    }

    /// Run the one activity selected for this power cycle.
    pub fn run(&mut self, pins: &mut impl ModeSelect) -> Terminal {
        self.board.watchdog.arm(WATCHDOG_TIMEOUT_MS);
        let inputs = pins.sample();
        let provisioned = match auth::is_provisioned(&mut self.board.state, &mut self.board.flash) {
            Ok(provisioned) => provisioned,
            Err(fault) => return self.halt(fault),
        };
        let mode = select(provisioned, inputs);
        info!("boot mode {:?}", mode);
        if let Err(fault) = self.board.link().write_byte(mode.banner()) {
            return self.halt(fault);
        }

        let result = match mode {
            BootMode::Enrollment => auth::enroll(&mut self.board).map(|()| Terminal::Enrolled),
            BootMode::Update => update(&mut self.board).map(Terminal::Updated),
            BootMode::Readback => readback(&mut self.board).map(Terminal::ReadbackDone),
            BootMode::BootJump => return self.boot_jump(),
        };
        match result {
            Ok(terminal) => {
                park(&mut self.board.watchdog);
                terminal
            }
            Err(fault) => self.halt(fault),
        }
    }

    fn boot_jump(&mut self) -> Terminal {
        let size = self.board.state.firmware_size();
        if size == 0 || u32::from(size) > APP_REGION_SIZE {
            return self.halt(Fault::NoFirmware);
        }
        if let Err(fault) = self.release_banner(u32::from(size)) {
            return self.halt(fault);
        }
        self.board.watchdog.disarm();
        info!("starting application, {} bytes", size);
        Terminal::Boot { entry: APP_ENTRY }
    }

    /// Copy the NUL-terminated release message stored after the image to the
    /// debug line.
    fn release_banner(&mut self, mut addr: u32) -> Result<(), Fault> {
        while addr < FLASH_SIZE {
            self.board.watchdog.pet();
            let byte = flash::read_byte(&mut self.board.flash, addr)?;
            echo(&mut self.board.debug, byte);
            if byte == 0 {
                break;
            }
            addr += 1;
        }
        Ok(())
    }

    fn halt(&mut self, fault: Fault) -> Terminal {
        error!("halted: {:?}", fault);
        self.board.echo(fault.code());
        park(&mut self.board.watchdog);
        Terminal::Halted(fault)
    }
}
