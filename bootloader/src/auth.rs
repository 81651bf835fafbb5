// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device credential: one-time provisioning and password checks.
//!
//! The credential page holds the password hash followed by the device key.
//! It is written once, after which the provisioned flag is set for the life
//! of the device.

use crate::cipher::{decrypt_in_place, expand_key, RoundKeys};
use crate::error::Fault;
use crate::flash::{self, PageProgrammer};
use crate::hash::Hash256;
use crate::platform::{Board, Platform};
use crate::store::{Eeprom, PersistentState};
use crate::verify::{compare, verify_signature, VerificationResult};
use consts::{CREDENTIAL_PAGE_ADDR, DIGEST_SIZE, KEY_SIZE, PAGE_SIZE, PASSWORD_SIZE, PROVISIONED, SIGNATURE_SIZE};
use core::hint::black_box;
use embedded_storage::nor_flash::ReadNorFlash;
use host_protocol::{Ack, EnrollmentRequest, UpdateMetadata};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the record stored at the start of the credential page.
pub const CREDENTIAL_SIZE: usize = DIGEST_SIZE + KEY_SIZE;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    password_hash: [u8; DIGEST_SIZE],
    device_key: [u8; KEY_SIZE],
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(..)")
    }
}

impl Credential {
    /// Read the credential page.
    pub fn load<F: ReadNorFlash>(flash: &mut F) -> Result<Self, Fault> {
        let mut buf = [0u8; CREDENTIAL_SIZE];
        flash::read(flash, CREDENTIAL_PAGE_ADDR, &mut buf)?;
        let mut credential = Self {
            password_hash: [0; DIGEST_SIZE],
            device_key: [0; KEY_SIZE],
        };
        credential.password_hash.copy_from_slice(&buf[..DIGEST_SIZE]);
        credential.device_key.copy_from_slice(&buf[DIGEST_SIZE..]);
        buf.zeroize();
        Ok(credential)
    }

    pub fn round_keys(&self) -> RoundKeys {
        expand_key(&self.device_key)
    }

    pub fn password_hash(&self) -> &[u8; DIGEST_SIZE] {
        &self.password_hash
    }

    /// Check an update metadata signature, `sign(hash(version || key))`.
    pub fn verify_metadata(
        &self,
        hasher: &impl Hash256,
        rk: &RoundKeys,
        version: u16,
        signature: &[u8; SIGNATURE_SIZE],
    ) -> VerificationResult {
        let mut message = UpdateMetadata::signed_bytes(version, &self.device_key);
        let result = verify_signature(hasher, rk, &message, signature);
        message.zeroize();
        result
    }
}

/// Password check outcome. Like `VerificationResult` the two values are far
/// apart, and a denial carries nothing about the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Access {
    Granted = 0x5ac3_3ca5,
    Denied = 0xa53c_c35a,
}

fn credential_page_blank<F: ReadNorFlash>(flash: &mut F) -> Result<bool, Fault> {
    let mut page = [0u8; PAGE_SIZE];
    flash::read(flash, CREDENTIAL_PAGE_ADDR, &mut page)?;
    let blank = page.iter().all(|b| *b == 0xff);
    page.zeroize();
    Ok(blank)
}

/// A device counts as provisioned when the flag is set or the credential
/// page holds anything.
pub fn is_provisioned<E: Eeprom, F: ReadNorFlash>(state: &mut PersistentState<E>, flash: &mut F) -> Result<bool, Fault> {
    Ok(state.is_provisioned() || !credential_page_blank(flash)?)
}

/// Fail with [`Fault::AlreadyProvisioned`] unless the flag reads blank twice
/// and the credential page is erased.
pub fn ensure_unprovisioned<E: Eeprom, F: ReadNorFlash>(state: &mut PersistentState<E>, flash: &mut F) -> Result<(), Fault> {
    if state.is_provisioned() {
        return Err(Fault::AlreadyProvisioned);
    }
    if black_box(state.provisioned_flag()) != consts::UNPROVISIONED {
        return Err(Fault::AlreadyProvisioned);
    }
    if !credential_page_blank(flash)? {
        return Err(Fault::AlreadyProvisioned);
    }
    Ok(())
}

/// Write the credential page, verify it, clear the firmware records and set
/// the provisioned flag.
pub fn provision<E: Eeprom, F: PageProgrammer>(
    state: &mut PersistentState<E>,
    flash: &mut F,
    request: &EnrollmentRequest,
) -> Result<(), Fault> {
    ensure_unprovisioned(state, flash)?;

    let mut page = [0u8; PAGE_SIZE];
    page[..DIGEST_SIZE].copy_from_slice(&request.password_hash);
    page[DIGEST_SIZE..CREDENTIAL_SIZE].copy_from_slice(&request.device_key);
    let written = flash::program_page(flash, CREDENTIAL_PAGE_ADDR, &page);

    let mut stored = [0u8; CREDENTIAL_SIZE];
    let result = written
        .and_then(|()| flash::read(flash, CREDENTIAL_PAGE_ADDR, &mut stored))
        .and_then(|()| {
            if compare(&stored, &page[..CREDENTIAL_SIZE]).is_valid() {
                Ok(())
            } else {
                Err(Fault::CredentialReadback)
            }
        });
    page.zeroize();
    stored.zeroize();
    result?;

    state.set_firmware_version(0);
    state.set_firmware_size(0);
    state.mark_provisioned();
    if state.provisioned_flag() != PROVISIONED {
        return Err(Fault::CredentialReadback);
    }
    info!("credential provisioned");
    Ok(())
}

/// Decrypt the candidate password, hash it and compare with the stored hash.
pub fn authenticate(
    credential: &Credential,
    rk: &RoundKeys,
    candidate: &[u8; PASSWORD_SIZE],
    hasher: &impl Hash256,
) -> Access {
    let mut plaintext = *candidate;
    decrypt_in_place(&mut plaintext, PASSWORD_SIZE / consts::CIPHER_BLOCK_SIZE, rk);
    let mut digest = hasher.hash(&plaintext);
    plaintext.zeroize();
    let result = compare(&digest, &credential.password_hash);
    digest.zeroize();
    if result.is_valid() {
        Access::Granted
    } else {
        Access::Denied
    }
}

/// Enrollment mode: receive the 48-byte record and provision it.
///
/// Answers `OK` once the credential is stored, `ERROR` on any failure that
/// leaves the line usable.
pub fn enroll<P: Platform>(board: &mut Board<P>) -> Result<(), Fault> {
    let result = receive_and_provision(board);
    match result {
        Ok(()) => board.link().ack(Ack::Ok),
        Err(Fault::Truncated) => Err(Fault::Truncated),
        Err(fault) => {
            let _ = board.link().ack(Ack::Error);
            Err(fault)
        }
    }
}

fn receive_and_provision<P: Platform>(board: &mut Board<P>) -> Result<(), Fault> {
    ensure_unprovisioned(&mut board.state, &mut board.flash)?;

    let mut buf = [0u8; EnrollmentRequest::SIZE];
    let mut link = board.link();
    link.wait_for_data()?;
    link.read_exact(&mut buf)?;
    let request = EnrollmentRequest::from_bytes(&buf);
    buf.zeroize();
    let mut request = request.map_err(|_| Fault::Truncated)?;

    let result = provision(&mut board.state, &mut board.flash, &request);
    request.password_hash.zeroize();
    request.device_key.zeroize();
    result
}
