// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Enrollment and readback requests.

use {
    bootloader::{
        cipher::{encrypt_block, encrypt_in_place, expand_key},
        hash::{Hash256, Sha256},
    },
    consts::{CIPHER_BLOCK_SIZE, KEY_SIZE, PASSWORD_SIZE},
    host_protocol::{EnrollmentRequest, ReadbackRequest},
};

/// The password as stored on the device: UTF-8, zero padded.
pub fn password_block(password: &str) -> Result<[u8; PASSWORD_SIZE], Error> {
    let bytes = password.as_bytes();
    if bytes.len() > PASSWORD_SIZE {
        return Err(Error::PasswordTooLong(bytes.len()));
    }
    let mut block = [0u8; PASSWORD_SIZE];
    block[..bytes.len()].copy_from_slice(bytes);
    Ok(block)
}

pub fn enrollment(password: &str, key: &[u8; KEY_SIZE]) -> Result<EnrollmentRequest, Error> {
    Ok(EnrollmentRequest {
        password_hash: Sha256.hash(&password_block(password)?),
        device_key: *key,
    })
}

pub fn readback(password: &str, start: u64, size: u64, key: &[u8; KEY_SIZE]) -> Result<ReadbackRequest, Error> {
    let rk = expand_key(key);
    let mut password = password_block(password)?;
    encrypt_in_place(&mut password, PASSWORD_SIZE / CIPHER_BLOCK_SIZE, &rk);
    let mut request = ReadbackRequest {
        password,
        start: encrypt_block(&start.to_be_bytes(), &rk),
        size: encrypt_block(&size.to_be_bytes(), &rk),
        hash: [0; 32],
    };
    request.hash = Sha256.hash(&request.hashed_bytes());
    Ok(request)
}

#[derive(Debug)]
pub enum Error {
    PasswordTooLong(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::PasswordTooLong(len) => {
                write!(f, "password is {len} bytes, at most {PASSWORD_SIZE} are allowed")
            }
        }
    }
}

impl std::error::Error for Error {}
