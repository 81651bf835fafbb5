// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    colored::Colorize,
    device::Device,
    package::UpdatePackage,
    std::{
        ffi::OsString,
        io::{Read, Write},
        path::Path,
        time::Duration,
    },
    tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter},
};

mod args;
mod device;
mod package;
mod request;

#[cfg(test)]
mod tests;

/// How long to wait for the device to answer before giving up.
const PORT_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> std::process::ExitCode {
    main_args(
        std::env::args_os(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .into()
}

fn main_args<I, T>(args: I, stdout: impl Write, mut stderr: impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match run(args, stdout) {
        Ok(()) => ExitCode(0),
        Err(Error::Args(e @ args::Error::Cli(_))) => {
            // Clap already does the "error: {}" formatting.
            let _ = writeln!(stderr, "{e}");
            ExitCode(1)
        }
        Err(e) => {
            let _ = writeln!(stderr, "{} {e}", "error:".bold().red());
            ExitCode(1)
        }
    }
}

fn run<I, T>(args: I, mut stdout: impl Write) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = args::args(args)?;
    init_tracing(args.verbose);

    match args.command {
        args::Command::Protect {
            input,
            output,
            version,
            message,
            key,
        } => {
            let firmware = load_firmware(&input)?;
            let package = UpdatePackage::protect(&firmware, version, &message, &key)?;
            std::fs::write(&output, package.to_bytes()?).map_err(Error::WriteOutputFile)?;
            writeln!(
                &mut stdout,
                "{} {} bytes, version {}, {} pages",
                "protected".bold(),
                firmware.len(),
                version,
                package.pages.len(),
            )
            .map_err(Error::Stdout)?;
        }
        args::Command::Inspect { input, key } => {
            let package = UpdatePackage::from_bytes(&read_file(&input)?)?;
            let metadata = &package.metadata;
            writeln!(&mut stdout, "{:10} {}", "version".bold(), metadata.version).map_err(Error::Stdout)?;
            writeln!(&mut stdout, "{:10} {}", "size".bold(), metadata.size).map_err(Error::Stdout)?;
            writeln!(&mut stdout, "{:10} {}", "pages".bold(), package.pages.len()).map_err(Error::Stdout)?;
            writeln!(
                &mut stdout,
                "{:10} {}",
                "signature".bold(),
                hex::encode(metadata.signature),
            )
            .map_err(Error::Stdout)?;
            for (index, page) in package.pages.iter().enumerate() {
                writeln!(
                    &mut stdout,
                    "{:10} {} ({} frames)",
                    format!("page {index}").bold(),
                    hex::encode(page.signature),
                    page.frames.len(),
                )
                .map_err(Error::Stdout)?;
            }
            if let Some(key) = key {
                package.verify(&key)?;
                writeln!(&mut stdout, "{}", "signatures valid".bold().green()).map_err(Error::Stdout)?;
            }
        }
        args::Command::Enroll { password, key, port } => {
            let request = request::enrollment(&password, &key)?;
            Device::new(open_port(&port)?).enroll(&request)?;
            writeln!(&mut stdout, "{}", "device enrolled".bold()).map_err(Error::Stdout)?;
        }
        args::Command::Update { package, port } => {
            let package = UpdatePackage::from_bytes(&read_file(&package)?)?;
            Device::new(open_port(&port)?).update(&package)?;
            writeln!(
                &mut stdout,
                "{} version {}, power cycle the device to start it",
                "updated".bold(),
                package.metadata.version,
            )
            .map_err(Error::Stdout)?;
        }
        args::Command::Readback {
            password,
            start,
            size,
            output,
            key,
            port,
        } => {
            let request = request::readback(&password, start, size, &key)?;
            let len = usize::try_from(size).map_err(|_| Error::ReadbackTooLarge(size))?;
            let dump = Device::new(open_port(&port)?).readback(&request, len)?;
            std::fs::write(&output, &dump).map_err(Error::WriteOutputFile)?;
            writeln!(
                &mut stdout,
                "{} {} bytes from {:#x}",
                "read".bold(),
                dump.len(),
                start
            )
            .map_err(Error::Stdout)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // A subscriber may already be installed when running under tests.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .try_init();
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    std::fs::File::open(path)
        .map_err(Error::OpenInputFile)?
        .read_to_end(&mut buf)
        .map_err(Error::ReadInputFile)?;
    Ok(buf)
}

/// Intel HEX when the extension says so, raw binary otherwise.
fn load_firmware(path: &Path) -> Result<Vec<u8>, Error> {
    let data = read_file(path)?;
    let is_hex = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("hex") || ext.eq_ignore_ascii_case("ihex"));
    if !is_hex {
        return Ok(data);
    }
    let text = String::from_utf8(data).map_err(|_| Error::HexNotUtf8)?;
    Ok(package::parse_ihex(&text)?)
}

fn open_port(port: &args::Port) -> Result<Box<dyn serialport::SerialPort>, Error> {
    tracing::info!(path = %port.path, baud = port.baud, "opening serial port");
    serialport::new(&port.path, port.baud)
        .timeout(PORT_TIMEOUT)
        .open()
        .map_err(Error::OpenPort)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitCode(u8);

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        code.0.into()
    }
}

#[derive(Debug)]
enum Error {
    Args(args::Error),
    Device(device::Error),
    HexNotUtf8,
    OpenInputFile(std::io::Error),
    OpenPort(serialport::Error),
    Package(package::Error),
    ReadInputFile(std::io::Error),
    ReadbackTooLarge(u64),
    Request(request::Error),
    Stdout(std::io::Error),
    WriteOutputFile(std::io::Error),
}

impl From<args::Error> for Error {
    fn from(e: args::Error) -> Self {
        Error::Args(e)
    }
}

impl From<device::Error> for Error {
    fn from(e: device::Error) -> Self {
        Error::Device(e)
    }
}

impl From<package::Error> for Error {
    fn from(e: package::Error) -> Self {
        Error::Package(e)
    }
}

impl From<request::Error> for Error {
    fn from(e: request::Error) -> Self {
        Error::Request(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Args(e) => write!(f, "{e}"),
            Error::Device(e) => write!(f, "{e}"),
            Error::HexNotUtf8 => write!(f, "Intel HEX input is not valid text"),
            Error::OpenInputFile(e) => write!(f, "failed to open input file: {e}"),
            Error::OpenPort(e) => write!(f, "failed to open serial port: {e}"),
            Error::Package(e) => write!(f, "{e}"),
            Error::ReadInputFile(e) => write!(f, "failed to read input file: {e}"),
            Error::ReadbackTooLarge(size) => write!(f, "readback size {size} is too large"),
            Error::Request(e) => write!(f, "{e}"),
            Error::Stdout(e) => write!(f, "failed to write to stdout: {e}"),
            Error::WriteOutputFile(e) => write!(f, "failed to write to output file: {e}"),
        }
    }
}

impl std::error::Error for Error {}
