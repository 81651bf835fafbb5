// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::DIGEST_SIZE;
use sha2::{Digest, Sha256 as Sha};

/// Digest over a whole number of bytes, the hashed length is the slice length.
pub trait Hash256 {
    fn hash(&self, data: &[u8]) -> [u8; DIGEST_SIZE];
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256;

impl Hash256 for Sha256 {
    fn hash(&self, data: &[u8]) -> [u8; DIGEST_SIZE] {
        Sha::digest(data).into()
    }
}
