// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host to bootloader serial protocol.
//! The host is the update/readback tool, the target is the bootloader.
//! Every message has a fixed big-endian layout; there is no framing beyond the
//! 16-bit length prefix of update frames.

#![no_std]
use consts::{CIPHER_BLOCK_SIZE, DIGEST_SIZE, FRAME_PAYLOAD_SIZE, KEY_SIZE, SIGNATURE_SIZE};
use serde::{Deserialize, Serialize};


/// Positive acknowledgment byte.
pub const OK: u8 = 0x00;
/// Negative acknowledgment byte.
pub const ERROR: u8 = 0x01;
/// Marker returned instead of a readback dump when any check fails.
pub const READBACK_REFUSED: u8 = b'F';

/// Acknowledgment sent by the target after metadata, after every frame and after every page.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Accepted, the host may send the next unit
    Ok,
    /// Rejected
    Error,
}

impl Ack {
    pub fn to_byte(self) -> u8 {
        match self {
            Ack::Ok => OK,
            Ack::Error => ERROR,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            OK => Some(Ack::Ok),
            ERROR => Some(Ack::Error),
            _ => None,
        }
    }
}

/// Banner byte written to the host line when the bootloader enters a mode.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Waiting for an update package
    Update,
    /// Waiting for a readback request
    Readback,
    /// Waiting for the one-time enrollment record
    Enrollment,
    /// Handing control to the application
    Boot,
}

impl Mode {
    pub fn banner(self) -> u8 {
        match self {
            Mode::Update => b'U',
            Mode::Readback => b'R',
            Mode::Enrollment => b'K',
            Mode::Boot => b'B',
        }
    }

    pub fn from_banner(b: u8) -> Option<Self> {
        match b {
            b'U' => Some(Mode::Update),
            b'R' => Some(Mode::Readback),
            b'K' => Some(Mode::Enrollment),
            b'B' => Some(Mode::Boot),
            _ => None,
        }
    }
}

/// Update header: firmware version, firmware size and the signature that
/// authenticates the version.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdateMetadata {
    /// Firmware version, `0` bypasses the anti-rollback check
    pub version: u16,
    /// Size of the firmware image, the release message starts at this offset
    pub size: u16,
    /// `sign(hash(version || device_key))`
    pub signature: [u8; SIGNATURE_SIZE],
}

impl UpdateMetadata {
    /// Size on the wire.
    pub const SIZE: usize = 2 + 2 + SIGNATURE_SIZE;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.version.to_be_bytes());
        buf[2..4].copy_from_slice(&self.size.to_be_bytes());
        buf[4..].copy_from_slice(&self.signature);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let buf = fixed::<{ UpdateMetadata::SIZE }>(buf)?;
        Ok(Self {
            version: u16::from_be_bytes([buf[0], buf[1]]),
            size: u16::from_be_bytes([buf[2], buf[3]]),
            signature: take(&buf[4..]),
        })
    }

    /// Bytes covered by the metadata signature: the big-endian version followed by the device key.
    pub fn signed_bytes(version: u16, key: &[u8; KEY_SIZE]) -> [u8; 2 + KEY_SIZE] {
        let mut buf = [0u8; 2 + KEY_SIZE];
        buf[..2].copy_from_slice(&version.to_be_bytes());
        buf[2..].copy_from_slice(key);
        buf
    }
}

/// Length prefix of the frame that terminates an image.
pub const END_OF_IMAGE: [u8; 2] = [0, 0];

/// Encode one data frame: big-endian length followed by the payload.
pub fn encode_frame(payload: &[u8; FRAME_PAYLOAD_SIZE]) -> [u8; 2 + FRAME_PAYLOAD_SIZE] {
    let mut buf = [0u8; 2 + FRAME_PAYLOAD_SIZE];
    buf[..2].copy_from_slice(&(FRAME_PAYLOAD_SIZE as u16).to_be_bytes());
    buf[2..].copy_from_slice(payload);
    buf
}

/// Authenticated request to dump a region of flash.
/// The password, start address and size are encrypted with the device key;
/// the hash covers the three ciphertexts.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadbackRequest {
    pub password: [u8; DIGEST_SIZE],
    pub start: [u8; CIPHER_BLOCK_SIZE],
    pub size: [u8; CIPHER_BLOCK_SIZE],
    pub hash: [u8; DIGEST_SIZE],
}

impl ReadbackRequest {
    /// Size on the wire.
    pub const SIZE: usize = DIGEST_SIZE + 2 * CIPHER_BLOCK_SIZE + DIGEST_SIZE;
    /// Number of leading bytes covered by `hash`.
    pub const HASHED_SIZE: usize = DIGEST_SIZE + 2 * CIPHER_BLOCK_SIZE;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..Self::HASHED_SIZE].copy_from_slice(&self.hashed_bytes());
        buf[Self::HASHED_SIZE..].copy_from_slice(&self.hash);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let buf = fixed::<{ ReadbackRequest::SIZE }>(buf)?;
        Ok(Self {
            password: take(&buf[0..32]),
            start: take(&buf[32..40]),
            size: take(&buf[40..48]),
            hash: take(&buf[48..80]),
        })
    }

    /// The ciphertext fields, in wire order.
    pub fn hashed_bytes(&self) -> [u8; Self::HASHED_SIZE] {
        let mut buf = [0u8; Self::HASHED_SIZE];
        buf[0..32].copy_from_slice(&self.password);
        buf[32..40].copy_from_slice(&self.start);
        buf[40..48].copy_from_slice(&self.size);
        buf
    }
}

/// One-time enrollment record: the hashed password and the device key.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnrollmentRequest {
    pub password_hash: [u8; DIGEST_SIZE],
    pub device_key: [u8; KEY_SIZE],
}

impl EnrollmentRequest {
    /// Size on the wire.
    pub const SIZE: usize = DIGEST_SIZE + KEY_SIZE;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..DIGEST_SIZE].copy_from_slice(&self.password_hash);
        buf[DIGEST_SIZE..].copy_from_slice(&self.device_key);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let buf = fixed::<{ EnrollmentRequest::SIZE }>(buf)?;
        Ok(Self {
            password_hash: take(&buf[..DIGEST_SIZE]),
            device_key: take(&buf[DIGEST_SIZE..]),
        })
    }
}

/// Wire decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The buffer does not have the exact size of the message
    InvalidLength { expected: usize, actual: usize },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidLength { expected, actual } => {
                write!(f, "invalid message length: expected {expected} bytes, got {actual}")
            }
        }
    }
}

fn fixed<const N: usize>(buf: &[u8]) -> Result<&[u8; N], Error> {
    buf.try_into().map_err(|_| Error::InvalidLength {
        expected: N,
        actual: buf.len(),
    })
}

fn take<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(buf);
    out
}
