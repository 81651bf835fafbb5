// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Password-gated flash dump.

use crate::auth::{self, authenticate, Access, Credential};
use crate::cipher::decrypt_block;
use crate::error::Fault;
use crate::flash;
use crate::hash::Hash256;
use crate::platform::{Board, Platform};
use crate::serial::Link;
use crate::verify::compare;
use crate::watchdog::Watchdog;
use consts::FLASH_SIZE;
use core::hint::black_box;
use host_protocol::{ReadbackRequest, READBACK_REFUSED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadbackReport {
    pub start: u32,
    pub size: u32,
}

/// Readback mode entry point.
///
/// Any refusal is answered with a single `'F'` on the host line and nothing
/// else.
pub fn readback<P: Platform>(board: &mut Board<P>) -> Result<ReadbackReport, Fault> {
    let result = serve(board);
    if let Err(fault) = result {
        warn!("readback refused: {:?}", fault);
        if fault != Fault::Truncated {
            let _ = board.link().write_byte(READBACK_REFUSED);
        }
    }
    result
}

/// Reject ranges that leave the flash, `start + size` must not overflow.
pub fn check_range(start: u64, size: u64) -> Result<(u32, u32), Fault> {
    let end = start.checked_add(size).ok_or(Fault::AddressOutOfRange)?;
    if start >= u64::from(FLASH_SIZE) || end > u64::from(FLASH_SIZE) {
        return Err(Fault::AddressOutOfRange);
    }
    Ok((start as u32, size as u32))
}

fn serve<P: Platform>(board: &mut Board<P>) -> Result<ReadbackReport, Fault> {
    if !auth::is_provisioned(&mut board.state, &mut board.flash)? {
        return Err(Fault::NotProvisioned);
    }
    let credential = Credential::load(&mut board.flash)?;
    let rk = credential.round_keys();

    let Board {
        host,
        flash,
        watchdog,
        hasher,
        ..
    } = board;
    let mut link = Link::new(host, watchdog);

    link.wait_for_data()?;
    let mut buf = [0u8; ReadbackRequest::SIZE];
    link.read_exact(&mut buf)?;
    let request = ReadbackRequest::from_bytes(&buf).map_err(|_| Fault::Truncated)?;

    let digest = hasher.hash(&request.hashed_bytes());
    if !compare(&digest, &request.hash).is_valid() {
        return Err(Fault::RequestHash);
    }
    link.watchdog().pet();

    if authenticate(&credential, &rk, &request.password, &*hasher) != Access::Granted {
        return Err(Fault::PasswordMismatch);
    }
    link.watchdog().pet();

    let start = u64::from_be_bytes(decrypt_block(&request.start, &rk));
    let size = u64::from_be_bytes(decrypt_block(&request.size, &rk));
    let (start, size) = check_range(start, size)?;
    if black_box(start).checked_add(black_box(size)).map_or(true, |end| end > FLASH_SIZE) {
        return Err(Fault::AddressOutOfRange);
    }
    info!("readback of {} bytes from {:x}", size, start);

    for addr in start..start + size {
        link.watchdog().pet();
        let byte = flash::read_byte(flash, addr)?;
        link.write_byte(byte)?;
    }
    link.watchdog().pet();
    Ok(ReadbackReport { start, size })
}
