// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Whole-boot scenarios on the simulated platform.

use crate::auth;
use crate::cipher::{encrypt_in_place, expand_key, sign};
use crate::hash::{Hash256, Sha256};
use crate::sim::{Sim, SimSerial};
use crate::{Board, Bootloader, ModeInputs, Terminal};
use consts::{CIPHER_BLOCK_SIZE, FRAME_PAYLOAD_SIZE, KEY_SIZE, PAGE_SIZE, PASSWORD_SIZE};
use host_protocol::{encode_frame, EnrollmentRequest, ReadbackRequest, UpdateMetadata, END_OF_IMAGE};

mod boot;
mod update;

const KEY: [u8; KEY_SIZE] = *b"0123456789abcdef";
const PASSWORD: &str = "correct horse";

const LOAD: ModeInputs = ModeInputs {
    load: true,
    readback: false,
};
const READBACK: ModeInputs = ModeInputs {
    load: false,
    readback: true,
};
const NONE: ModeInputs = ModeInputs {
    load: false,
    readback: false,
};

fn padded_password(password: &str) -> [u8; PASSWORD_SIZE] {
    let mut buf = [0u8; PASSWORD_SIZE];
    buf[..password.len()].copy_from_slice(password.as_bytes());
    buf
}

fn enrollment() -> EnrollmentRequest {
    EnrollmentRequest {
        password_hash: Sha256.hash(&padded_password(PASSWORD)),
        device_key: KEY,
    }
}

/// A board that went through enrollment, with `input` queued on the host line.
fn provisioned(input: &[u8]) -> Board<Sim> {
    let mut board = Board::sim(SimSerial::new(input));
    auth::provision(&mut board.state, &mut board.flash, &enrollment()).unwrap();
    board
}

fn run(board: Board<Sim>, mut inputs: ModeInputs) -> (Terminal, Board<Sim>) {
    let mut bootloader = Bootloader::new(board);
    let terminal = bootloader.run(&mut inputs);
    (terminal, bootloader.into_board())
}

fn metadata(version: u16, size: u16) -> [u8; UpdateMetadata::SIZE] {
    let rk = expand_key(&KEY);
    let digest = Sha256.hash(&UpdateMetadata::signed_bytes(version, &KEY));
    UpdateMetadata {
        version,
        size,
        signature: sign(&digest, &rk),
    }
    .to_bytes()
}

/// Host side of an update: metadata, then frames with a signature after every
/// page-completing frame. `image` is padded to whole frames.
fn update_stream(version: u16, image: &[u8]) -> Vec<u8> {
    let rk = expand_key(&KEY);
    let mut stream = metadata(version, image.len() as u16).to_vec();

    let mut data = image.to_vec();
    data.resize(image.len().div_ceil(FRAME_PAYLOAD_SIZE) * FRAME_PAYLOAD_SIZE, 0);
    let segments = data.len() / CIPHER_BLOCK_SIZE;
    encrypt_in_place(&mut data, segments, &rk);

    for page in data.chunks(PAGE_SIZE) {
        for frame in page.chunks(FRAME_PAYLOAD_SIZE) {
            let mut payload = [0u8; FRAME_PAYLOAD_SIZE];
            payload.copy_from_slice(frame);
            stream.extend_from_slice(&encode_frame(&payload));
        }
        if page.len() < PAGE_SIZE {
            stream.extend_from_slice(&END_OF_IMAGE);
        }
        stream.extend_from_slice(&sign(&Sha256.hash(page), &rk));
    }
    if data.len() % PAGE_SIZE == 0 {
        stream.extend_from_slice(&END_OF_IMAGE);
    }
    stream
}

/// Flip a bit in the first payload byte of the second page of a stream whose
/// first page is full.
fn corrupt_second_page(stream: &mut [u8]) {
    let first_page = consts::FRAMES_PER_PAGE * (2 + FRAME_PAYLOAD_SIZE) + consts::SIGNATURE_SIZE;
    stream[UpdateMetadata::SIZE + first_page + 2] ^= 0x01;
}

fn readback_request(password: &str, start: u64, size: u64) -> [u8; ReadbackRequest::SIZE] {
    let rk = expand_key(&KEY);
    let mut password = padded_password(password);
    encrypt_in_place(&mut password, PASSWORD_SIZE / CIPHER_BLOCK_SIZE, &rk);
    let mut start = start.to_be_bytes();
    encrypt_in_place(&mut start, 1, &rk);
    let mut size = size.to_be_bytes();
    encrypt_in_place(&mut size, 1, &rk);
    let mut request = ReadbackRequest {
        password,
        start,
        size,
        hash: [0; 32],
    };
    request.hash = Sha256.hash(&request.hashed_bytes());
    request.to_bytes()
}
