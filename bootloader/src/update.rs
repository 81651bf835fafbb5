// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Authenticated firmware update.
//!
//! The host first sends the metadata (version, size, signature). Once the
//! signature checks out the version is compared against the stored one and
//! persisted. Frames are then collected into pages; every page is followed by
//! its signature and is only decrypted and programmed when the signature
//! matches. Any failure ends the session.
//!
//! The stored firmware size marks the image as installed. It is cleared before
//! the first page is programmed and only set once the last page is committed,
//! so an interrupted session never leaves a bootable partial image.

use crate::auth::{self, Credential};
use crate::error::Fault;
use crate::flash::program_page;
use crate::frame::{receive_frame, FrameEvent, PageBuffer};
use crate::platform::{echo, Board, Platform};
use crate::serial::Link;
use crate::verify::verify_signature;
use crate::version::{check_and_commit, VersionDecision};
use crate::watchdog::Watchdog;
use consts::{APP_REGION_SIZE, CREDENTIAL_PAGE_ADDR, PAGE_SIZE, SIGNATURE_SIZE};
use host_protocol::{Ack, UpdateMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    AwaitMetadata,
    MetadataVerified,
    ReceivingFrames,
    PageComplete,
    ImageComplete,
}

/// Summary of a completed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdateReport {
    pub version: u16,
    pub size: u16,
    pub pages: u16,
}

pub struct UpdateSession {
    state: SessionState,
    page: PageBuffer,
    address: u32,
    pages: u16,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSession {
    pub const fn new() -> Self {
        Self {
            state: SessionState::AwaitMetadata,
            page: PageBuffer::new(),
            address: 0,
            pages: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Next page address to be programmed.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Run the session to completion.
    ///
    /// A failure that leaves the line in sync is answered with `ERROR` before
    /// it is returned.
    pub fn run<P: Platform>(&mut self, board: &mut Board<P>) -> Result<UpdateReport, Fault> {
        let result = self.drive(board);
        if let Err(fault) = result {
            error!("update failed in {:?}: {:?}", self.state, fault);
            if fault != Fault::Truncated {
                let _ = board.link().ack(Ack::Error);
            }
        }
        result
    }

    fn drive<P: Platform>(&mut self, board: &mut Board<P>) -> Result<UpdateReport, Fault> {
        if !auth::is_provisioned(&mut board.state, &mut board.flash)? {
            return Err(Fault::NotProvisioned);
        }
        let credential = Credential::load(&mut board.flash)?;
        let rk = credential.round_keys();

        let Board {
            host,
            debug,
            flash,
            state,
            watchdog,
            hasher,
        } = board;
        let mut link = Link::new(host, watchdog);

        self.state = SessionState::AwaitMetadata;
        link.wait_for_data()?;
        let mut buf = [0u8; UpdateMetadata::SIZE];
        link.read_exact(&mut buf)?;
        let metadata = UpdateMetadata::from_bytes(&buf).map_err(|_| Fault::Truncated)?;
        if !credential
            .verify_metadata(&*hasher, &rk, metadata.version, &metadata.signature)
            .is_valid()
        {
            return Err(Fault::MetadataSignature);
        }
        self.state = SessionState::MetadataVerified;
        info!("update to version {} ({} bytes)", metadata.version, metadata.size);

        if u32::from(metadata.size) > APP_REGION_SIZE {
            return Err(Fault::ImageTooLarge);
        }
        if check_and_commit(state, metadata.version) == VersionDecision::Reject {
            return Err(Fault::Rollback);
        }
        state.set_firmware_size(0);
        link.ack(Ack::Ok)?;

        self.state = SessionState::ReceivingFrames;
        self.address = 0;
        self.pages = 0;
        self.page.reset();
        loop {
            let last = match receive_frame(&mut link, debug, &mut self.page)? {
                FrameEvent::Data if self.page.is_full() => false,
                FrameEvent::Data | FrameEvent::Malformed { .. } => continue,
                FrameEvent::End if self.page.is_empty() => break,
                FrameEvent::End => true,
            };

            self.state = SessionState::PageComplete;
            let mut signature = [0u8; SIGNATURE_SIZE];
            link.read_exact(&mut signature)?;
            if self.address >= CREDENTIAL_PAGE_ADDR {
                return Err(Fault::AddressOutOfRange);
            }
            link.watchdog().pet();
            if !verify_signature(&*hasher, &rk, self.page.transmitted(), &signature).is_valid() {
                return Err(Fault::PageSignature);
            }
            link.watchdog().pet();

            self.page.decrypt(&rk);
            program_page(flash, self.address, self.page.page())?;
            echo(debug, b'P');
            echo(debug, (self.address >> 8) as u8);
            echo(debug, self.address as u8);
            link.ack(Ack::Ok)?;
            debug!("page {:x} committed", self.address);

            self.address += PAGE_SIZE as u32;
            self.pages += 1;
            self.page.reset();
            if last {
                break;
            }
            self.state = SessionState::ReceivingFrames;
        }

        state.set_firmware_size(metadata.size);
        self.state = SessionState::ImageComplete;
        info!("update complete, {} pages", self.pages);
        Ok(UpdateReport {
            version: metadata.version,
            size: metadata.size,
            pages: self.pages,
        })
    }
}

/// Update mode entry point.
pub fn update<P: Platform>(board: &mut Board<P>) -> Result<UpdateReport, Fault> {
    UpdateSession::new().run(board)
}
