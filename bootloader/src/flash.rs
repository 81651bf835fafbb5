// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Page-wise programming of the internal flash.

use crate::error::Fault;
use consts::PAGE_SIZE;
use embedded_storage::nor_flash::ReadNorFlash;

/// Self-programming interface of a flash with a page buffer.
///
/// A page is written by erasing it, filling the page buffer one 16-bit word
/// at a time and committing the buffer. Reads of the application region
/// stall until read-while-write is enabled again.
pub trait PageProgrammer: ReadNorFlash {
    fn erase_page(&mut self, addr: u32) -> Result<(), Self::Error>;
    fn fill_word(&mut self, addr: u32, word: u16) -> Result<(), Self::Error>;
    fn commit_page(&mut self, addr: u32) -> Result<(), Self::Error>;
    fn enable_rww(&mut self) -> Result<(), Self::Error>;
}

/// Erase, fill and commit one page at the page-aligned `addr`.
pub fn program_page<F: PageProgrammer>(flash: &mut F, addr: u32, page: &[u8; PAGE_SIZE]) -> Result<(), Fault> {
    if addr as usize % PAGE_SIZE != 0 || addr as usize + PAGE_SIZE > flash.capacity() {
        error!("bad page address {:x}", addr);
        return Err(Fault::Flash);
    }
    flash.erase_page(addr).map_err(|_| Fault::Flash)?;
    for (offset, pair) in (0u32..).step_by(2).zip(page.chunks_exact(2)) {
        flash
            .fill_word(addr + offset, u16::from_le_bytes([pair[0], pair[1]]))
            .map_err(|_| Fault::Flash)?;
    }
    flash.commit_page(addr).map_err(|_| Fault::Flash)?;
    flash.enable_rww().map_err(|_| Fault::Flash)?;
    debug!("page {:x} programmed", addr);
    Ok(())
}

pub fn read<F: ReadNorFlash>(flash: &mut F, addr: u32, buf: &mut [u8]) -> Result<(), Fault> {
    flash.read(addr, buf).map_err(|_| Fault::Flash)
}

pub fn read_byte<F: ReadNorFlash>(flash: &mut F, addr: u32) -> Result<u8, Fault> {
    let mut byte = [0u8; 1];
    read(flash, addr, &mut byte)?;
    Ok(byte[0])
}
