// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command line arguments.

use std::path::PathBuf;

#[derive(clap::Parser)]
#[command(version, about)]
pub struct Args {
    /// Increase log output, repeat for more.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

/// Serial port options shared by the commands that talk to a device.
#[derive(clap::Args)]
pub struct PortArgs {
    /// Serial port connected to the bootloader, e.g. /dev/ttyUSB0.
    #[clap(long, short)]
    pub port: Option<String>,
    /// Baud rate of the serial port.
    #[clap(long)]
    pub baud: Option<u32>,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Encrypt and sign a firmware image into an update package.
    Protect {
        /// Firmware image, Intel HEX (.hex, .ihex) or raw binary.
        #[clap(short, long)]
        input: PathBuf,
        /// Path to write the update package.
        #[clap(short, long)]
        output: PathBuf,
        /// Firmware version, 0 skips the anti-rollback check on the device.
        #[clap(long)]
        firmware_version: u16,
        /// Release message shown by the bootloader before starting the firmware.
        #[clap(long, short, default_value = "")]
        message: String,
        /// Device key, 16 bytes in hex.
        #[clap(long, short)]
        key: Option<String>,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
    /// Print the contents of an update package.
    Inspect {
        /// The update package.
        #[clap(short, long)]
        input: PathBuf,
        /// Device key in hex, to check the package signatures.
        #[clap(long, short)]
        key: Option<String>,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
    /// Store the password hash and device key on a blank device.
    Enroll {
        /// Readback password, at most 32 bytes.
        #[clap(long)]
        password: String,
        /// Device key, 16 bytes in hex.
        #[clap(long, short)]
        key: Option<String>,
        #[command(flatten)]
        port: PortArgs,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
    /// Send an update package to a device in update mode.
    Update {
        /// The update package.
        #[clap(long)]
        package: PathBuf,
        #[command(flatten)]
        port: PortArgs,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
    /// Dump a range of flash from a device in readback mode.
    Readback {
        /// Readback password given at enrollment.
        #[clap(long)]
        password: String,
        /// First address to read, decimal or 0x-prefixed hex.
        #[clap(long, value_parser = parse_int)]
        start: u64,
        /// Number of bytes to read, decimal or 0x-prefixed hex.
        #[clap(long, value_parser = parse_int)]
        size: u64,
        /// Path to write the dump.
        #[clap(short, long)]
        output: PathBuf,
        /// Device key, 16 bytes in hex.
        #[clap(long, short)]
        key: Option<String>,
        #[command(flatten)]
        port: PortArgs,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
}

fn parse_int(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}
