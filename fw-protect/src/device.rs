// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host side of the serial protocol.
//!
//! Every operation starts by reading the mode banner the bootloader writes
//! at reset, then runs the stop-and-wait exchange for that mode.

use {
    crate::package::UpdatePackage,
    host_protocol::{encode_frame, Ack, EnrollmentRequest, Mode, ReadbackRequest, END_OF_IMAGE, READBACK_REFUSED},
    std::io::{ErrorKind, Read, Write},
};

pub struct Device<T> {
    port: T,
}

impl<T: Read + Write> Device<T> {
    pub fn new(port: T) -> Self {
        Self { port }
    }

    pub fn enroll(&mut self, request: &EnrollmentRequest) -> Result<(), Error> {
        self.expect_banner(Mode::Enrollment)?;
        self.send(&request.to_bytes())?;
        self.expect_ack(Stage::Enrollment)?;
        tracing::info!("credential stored");
        Ok(())
    }

    pub fn update(&mut self, package: &UpdatePackage) -> Result<(), Error> {
        self.expect_banner(Mode::Update)?;
        self.send(&package.metadata.to_bytes())?;
        self.expect_ack(Stage::Metadata)?;
        tracing::info!(
            version = package.metadata.version,
            size = package.metadata.size,
            "metadata accepted"
        );

        for (index, page) in package.pages.iter().enumerate() {
            for (frame, payload) in page.frames.iter().enumerate() {
                self.send(&encode_frame(payload))?;
                self.expect_ack(Stage::Frame { page: index, frame })?;
            }
            if !page.is_full() {
                self.send(&END_OF_IMAGE)?;
                self.expect_ack(Stage::End)?;
            }
            self.send(&page.signature)?;
            self.expect_ack(Stage::Page(index))?;
            tracing::debug!(page = index, "page committed");
        }
        if package.pages.last().map_or(true, |page| page.is_full()) {
            self.send(&END_OF_IMAGE)?;
            self.expect_ack(Stage::End)?;
        }
        tracing::info!(pages = package.pages.len(), "update complete");
        Ok(())
    }

    /// Request `size` bytes of flash. A lone `'F'` followed by silence is a
    /// refusal.
    ///
    /// A refusal and a one-byte dump of a cell holding `'F'` look the same on
    /// the wire. With `size == 1` the byte is always returned as data.
    pub fn readback(&mut self, request: &ReadbackRequest, size: usize) -> Result<Vec<u8>, Error> {
        self.expect_banner(Mode::Readback)?;
        self.send(&request.to_bytes())?;

        let mut dump = Vec::with_capacity(size);
        let mut byte = [0u8; 1];
        while dump.len() < size.max(1) {
            match self.port.read(&mut byte) {
                Ok(1) => dump.push(byte[0]),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        if size != 1 && dump == [READBACK_REFUSED] {
            return Err(Error::Refused);
        }
        if dump.len() != size {
            return Err(Error::Closed);
        }
        tracing::info!(bytes = dump.len(), "readback complete");
        Ok(dump)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.port.write_all(bytes).map_err(Error::Io)?;
        self.port.flush().map_err(Error::Io)
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        match self.port.read_exact(&mut byte) {
            Ok(()) => Ok(byte[0]),
            Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::TimedOut) => Err(Error::Closed),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn expect_banner(&mut self, mode: Mode) -> Result<(), Error> {
        let got = self.read_byte()?;
        if got != mode.banner() {
            return Err(Error::UnexpectedBanner { expected: mode, got });
        }
        tracing::debug!(?mode, "device ready");
        Ok(())
    }

    fn expect_ack(&mut self, stage: Stage) -> Result<(), Error> {
        let byte = self.read_byte()?;
        match Ack::from_byte(byte) {
            Some(Ack::Ok) => Ok(()),
            Some(Ack::Error) => Err(Error::Rejected(stage)),
            None => Err(Error::UnexpectedReply { stage, byte }),
        }
    }
}

/// Point of the exchange an acknowledgment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Enrollment,
    Metadata,
    Frame { page: usize, frame: usize },
    End,
    Page(usize),
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Stage::Enrollment => write!(f, "enrollment record"),
            Stage::Metadata => write!(f, "update metadata"),
            Stage::Frame { page, frame } => write!(f, "frame {frame} of page {page}"),
            Stage::End => write!(f, "end of image"),
            Stage::Page(page) => write!(f, "signature of page {page}"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Closed,
    Io(std::io::Error),
    Refused,
    Rejected(Stage),
    UnexpectedBanner { expected: Mode, got: u8 },
    UnexpectedReply { stage: Stage, byte: u8 },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Closed => write!(f, "device stopped answering"),
            Error::Io(e) => write!(f, "serial port error: {e}"),
            Error::Refused => write!(f, "device refused the readback request"),
            Error::Rejected(stage) => write!(f, "device rejected the {stage}"),
            Error::UnexpectedBanner { expected, got } => write!(
                f,
                "device is not in {expected:?} mode (banner {got:#04x}), check the mode jumpers"
            ),
            Error::UnexpectedReply { stage, byte } => {
                write!(f, "unexpected reply {byte:#04x} to the {stage}")
            }
        }
    }
}

impl std::error::Error for Error {}
