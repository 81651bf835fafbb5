// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reception of length-prefixed update frames into a page buffer.

use crate::cipher::{decrypt_in_place, RoundKeys};
use crate::error::Fault;
use crate::platform::echo;
use crate::serial::{Link, Serial};
use crate::watchdog::Watchdog;
use consts::{CIPHER_BLOCK_SIZE, FRAME_PAYLOAD_SIZE, PAGE_SIZE};
use host_protocol::Ack;

/// One flash page being assembled from frames.
pub struct PageBuffer {
    data: [u8; PAGE_SIZE],
    cursor: usize,
    frames: usize,
}

impl Default for PageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; PAGE_SIZE],
            cursor: 0,
            frames: 0,
        }
    }

    /// Append one frame payload. Returns `false` if the page is already full.
    pub fn push(&mut self, payload: &[u8; FRAME_PAYLOAD_SIZE]) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.cursor..self.cursor + FRAME_PAYLOAD_SIZE].copy_from_slice(payload);
        self.cursor += FRAME_PAYLOAD_SIZE;
        self.frames += 1;
        true
    }

    pub fn is_full(&self) -> bool {
        self.cursor == PAGE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of payload bytes received for this page, the length the host
    /// signed.
    pub fn transmitted_len(&self) -> usize {
        self.frames * FRAME_PAYLOAD_SIZE
    }

    pub fn transmitted(&self) -> &[u8] {
        &self.data[..self.transmitted_len()]
    }

    /// Cipher blocks received for this page.
    pub fn segments(&self) -> usize {
        self.transmitted_len() / CIPHER_BLOCK_SIZE
    }

    /// Decrypt the received blocks and zero the rest of the page.
    pub fn decrypt(&mut self, rk: &RoundKeys) {
        let len = self.transmitted_len();
        let segments = self.segments();
        decrypt_in_place(&mut self.data, segments, rk);
        self.data[len..].fill(0);
    }

    pub fn page(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.frames = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameEvent {
    /// A payload was appended to the page.
    Data,
    /// Zero-length frame: the image is complete.
    End,
    /// Wrong length. The payload was discarded and the host told to resend.
    Malformed { length: u16 },
}

/// Receive one frame, append its payload to `page` and acknowledge it.
pub fn receive_frame<S, W, D>(link: &mut Link<'_, S, W>, debug: &mut D, page: &mut PageBuffer) -> Result<FrameEvent, Fault>
where
    S: Serial,
    W: Watchdog,
    D: embedded_io::Write,
{
    link.wait_for_data()?;
    let length = link.read_u16()?;
    echo(debug, length as u8);

    match length as usize {
        0 => {
            link.ack(Ack::Ok)?;
            Ok(FrameEvent::End)
        }
        FRAME_PAYLOAD_SIZE if !page.is_full() => {
            let mut payload = [0u8; FRAME_PAYLOAD_SIZE];
            link.read_exact(&mut payload)?;
            page.push(&payload);
            link.ack(Ack::Ok)?;
            Ok(FrameEvent::Data)
        }
        _ => {
            for _ in 0..length {
                link.read_byte()?;
            }
            warn!("malformed frame of {} bytes", length);
            link.ack(Ack::Error)?;
            Ok(FrameEvent::Malformed { length })
        }
    }
}
