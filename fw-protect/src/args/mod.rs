// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    clap::Parser,
    consts::KEY_SIZE,
    std::path::{Path, PathBuf},
};

mod cli;
mod config;

pub use config::Error as ConfigError;

/// Baud rate used when neither the CLI nor the config file name one.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Program arguments loaded from the CLI and config file.
#[derive(Debug, Clone)]
pub struct Args {
    pub verbose: u8,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Build an update package.
    Protect {
        input: PathBuf,
        output: PathBuf,
        version: u16,
        message: String,
        key: [u8; KEY_SIZE],
    },
    /// Print an update package, checking its signatures if a key is known.
    Inspect {
        input: PathBuf,
        key: Option<[u8; KEY_SIZE]>,
    },
    Enroll {
        password: String,
        key: [u8; KEY_SIZE],
        port: Port,
    },
    Update {
        package: PathBuf,
        port: Port,
    },
    Readback {
        password: String,
        start: u64,
        size: u64,
        output: PathBuf,
        key: [u8; KEY_SIZE],
        port: Port,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub path: String,
    pub baud: u32,
}

pub fn args<I, T>(args: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Args::try_parse_from(args).map_err(Error::Cli)?;
    let command = match cli.command {
        cli::Command::Protect {
            input,
            output,
            firmware_version,
            message,
            key,
            config,
        } => {
            let config = load(config.as_deref())?;
            Command::Protect {
                input,
                output,
                version: firmware_version,
                message,
                key: required_key(key, config.key)?,
            }
        }
        cli::Command::Inspect { input, key, config } => {
            let config = load(config.as_deref())?;
            Command::Inspect {
                input,
                key: optional_key(key, config.key)?,
            }
        }
        cli::Command::Enroll {
            password,
            key,
            port,
            config,
        } => {
            let config = load(config.as_deref())?;
            Command::Enroll {
                password,
                key: required_key(key, config.key)?,
                port: port_args(port, config.port, config.baud)?,
            }
        }
        cli::Command::Update {
            package,
            port,
            config,
        } => {
            let config = load(config.as_deref())?;
            Command::Update {
                package,
                port: port_args(port, config.port, config.baud)?,
            }
        }
        cli::Command::Readback {
            password,
            start,
            size,
            output,
            key,
            port,
            config,
        } => {
            let config = load(config.as_deref())?;
            Command::Readback {
                password,
                start,
                size,
                output,
                key: required_key(key, config.key)?,
                port: port_args(port, config.port, config.baud)?,
            }
        }
    };
    Ok(Args {
        verbose: cli.verbose,
        command,
    })
}

fn load(path: Option<&Path>) -> Result<config::Config, Error> {
    Ok(path.map(config::Config::load).transpose()?.unwrap_or_default())
}

// Reconcile the CLI and config arguments. Error if anything is specified both
// on the CLI and in the config file.
fn optional_key(cli: Option<String>, config: Option<String>) -> Result<Option<[u8; KEY_SIZE]>, Error> {
    let key = match (cli, config) {
        (None, None) => return Ok(None),
        (None, Some(key)) => key,
        (Some(key), None) => key,
        (Some(_), Some(_)) => return Err(Error::KeyInConfigAndCli),
    };
    let bytes = hex::decode(key.trim()).map_err(|_| Error::InvalidKeyHex)?;
    let key = bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| Error::InvalidKeyLength(bytes.len()))?;
    Ok(Some(key))
}

fn required_key(cli: Option<String>, config: Option<String>) -> Result<[u8; KEY_SIZE], Error> {
    optional_key(cli, config)?.ok_or(Error::KeyMissing)
}

fn port_args(cli: cli::PortArgs, config_port: Option<String>, config_baud: Option<u32>) -> Result<Port, Error> {
    let path = match (cli.port, config_port) {
        (None, None) => return Err(Error::PortMissing),
        (None, Some(port)) => port,
        (Some(port), None) => port,
        (Some(_), Some(_)) => return Err(Error::PortInConfigAndCli),
    };
    let baud = match (cli.baud, config_baud) {
        (None, None) => DEFAULT_BAUD,
        (None, Some(baud)) => baud,
        (Some(baud), None) => baud,
        (Some(_), Some(_)) => return Err(Error::BaudInConfigAndCli),
    };
    Ok(Port { path, baud })
}

#[derive(Debug)]
pub enum Error {
    BaudInConfigAndCli,
    Cli(clap::Error),
    Config(ConfigError),
    InvalidKeyHex,
    InvalidKeyLength(usize),
    KeyInConfigAndCli,
    KeyMissing,
    PortInConfigAndCli,
    PortMissing,
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BaudInConfigAndCli => write!(f, "baud rate specified in both config and cli"),
            Error::Cli(e) => write!(f, "{}", e.render().ansi()),
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::InvalidKeyHex => write!(f, "user specified invalid device key hex"),
            Error::InvalidKeyLength(len) => {
                write!(f, "device key must be {KEY_SIZE} bytes, got {len}")
            }
            Error::KeyInConfigAndCli => write!(f, "key specified in both config and cli"),
            Error::KeyMissing => write!(
                f,
                "device key must be specified, either with --key or in the config file"
            ),
            Error::PortInConfigAndCli => write!(f, "port specified in both config and cli"),
            Error::PortMissing => write!(
                f,
                "serial port must be specified, either with --port or in the config file"
            ),
        }
    }
}

impl std::error::Error for Error {}
