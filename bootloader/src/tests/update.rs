// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::*;
use crate::update::{SessionState, UpdateReport, UpdateSession};
use crate::Fault;
use consts::{APP_REGION_SIZE, CREDENTIAL_PAGE_ADDR, FRAMES_PER_PAGE};
use host_protocol::{ERROR, OK};

const IMAGE: &[u8; 16] = b"firmware image!!";

#[test]
fn single_frame_image() {
    let board = provisioned(&update_stream(1, IMAGE));
    let (terminal, mut board) = run(board, LOAD);

    assert_eq!(
        terminal,
        Terminal::Updated(UpdateReport {
            version: 1,
            size: 16,
            pages: 1
        })
    );
    assert_eq!(board.host.output(), &[b'U', OK, OK, OK, OK]);
    assert_eq!(board.debug.output(), &[16, 0, b'P', 0, 0]);
    let page = board.flash.page(0);
    assert_eq!(&page[..16], IMAGE);
    assert!(page[16..].iter().all(|b| *b == 0));
    assert_eq!(board.state.firmware_version(), 1);
    assert_eq!(board.state.firmware_size(), 16);
    assert!(board.watchdog.fired());
}

#[test]
fn version_zero_keeps_stored_version() {
    let mut board = provisioned(&update_stream(0, IMAGE));
    board.state.set_firmware_version(5);
    let (terminal, mut board) = run(board, LOAD);

    assert!(matches!(terminal, Terminal::Updated(UpdateReport { version: 0, .. })));
    assert_eq!(board.state.firmware_version(), 5);
    assert_eq!(board.state.firmware_size(), 16);
    assert_eq!(&board.flash.page(0)[..16], IMAGE);
}

#[test]
fn older_version_is_refused_before_any_write() {
    let mut board = provisioned(&update_stream(4, IMAGE));
    board.state.set_firmware_version(5);
    board.state.set_firmware_size(0x20);
    let (terminal, mut board) = run(board, LOAD);

    assert_eq!(terminal, Terminal::Halted(Fault::Rollback));
    assert_eq!(board.host.output(), &[b'U', ERROR]);
    assert_eq!(board.debug.output(), b"R");
    assert_eq!(board.state.firmware_version(), 5);
    assert_eq!(board.state.firmware_size(), 0x20);
    assert_eq!(board.flash.commits(), &[CREDENTIAL_PAGE_ADDR]);
}

#[test]
fn forged_metadata_is_refused() {
    let mut stream = update_stream(9, IMAGE);
    stream[10] ^= 0x40;
    let board = provisioned(&stream);
    let (terminal, mut board) = run(board, LOAD);

    assert_eq!(terminal, Terminal::Halted(Fault::MetadataSignature));
    assert_eq!(board.host.output(), &[b'U', ERROR]);
    assert_eq!(board.state.firmware_version(), 0);
    assert_eq!(board.state.firmware_size(), 0);
}

#[test]
fn version_without_matching_signature_is_refused() {
    // Valid signature for version 1, metadata claims version 2.
    let mut stream = update_stream(1, IMAGE);
    stream[..2].copy_from_slice(&2u16.to_be_bytes());
    let (terminal, _) = run(provisioned(&stream), LOAD);
    assert_eq!(terminal, Terminal::Halted(Fault::MetadataSignature));
}

#[test]
fn tampered_payload_is_never_committed() {
    let mut stream = update_stream(1, IMAGE);
    stream[UpdateMetadata::SIZE + 2 + 3] ^= 0x01;
    let (terminal, board) = run(provisioned(&stream), LOAD);

    assert_eq!(terminal, Terminal::Halted(Fault::PageSignature));
    assert_eq!(board.host.output(), &[b'U', OK, OK, OK, ERROR]);
    assert_eq!(board.debug.output(), &[16, 0, b'F']);
    assert_eq!(board.flash.commits(), &[CREDENTIAL_PAGE_ADDR]);
    assert!(board.flash.page(0).iter().all(|b| *b == 0xff));
}

#[test]
fn multi_page_image() {
    let image: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();
    let (terminal, board) = run(provisioned(&update_stream(3, &image)), LOAD);

    assert_eq!(
        terminal,
        Terminal::Updated(UpdateReport {
            version: 3,
            size: 300,
            pages: 2
        })
    );
    assert_eq!(board.flash.page(0), &image[..PAGE_SIZE]);
    let last = board.flash.page(PAGE_SIZE as u32);
    assert_eq!(&last[..44], &image[PAGE_SIZE..]);
    assert!(last[44..].iter().all(|b| *b == 0));

    let mut expected = vec![b'U', OK];
    expected.extend([OK; FRAMES_PER_PAGE + 1]);
    expected.extend([OK; 3 + 1 + 1]);
    assert_eq!(board.host.output(), &expected[..]);
    let debug = board.debug.output();
    assert_eq!(&debug[debug.len() - 3..], &[b'P', 1, 0]);
}

#[test]
fn page_aligned_image_ends_without_signature() {
    let image = [0x3cu8; PAGE_SIZE];
    let (terminal, board) = run(provisioned(&update_stream(2, &image)), LOAD);

    assert_eq!(
        terminal,
        Terminal::Updated(UpdateReport {
            version: 2,
            size: PAGE_SIZE as u16,
            pages: 1
        })
    );
    assert_eq!(board.flash.page(0), &image[..]);
    assert_eq!(board.host.output().len(), 2 + FRAMES_PER_PAGE + 1 + 1);
    assert_eq!(board.host.remaining_input(), 0);
}

#[test]
fn malformed_frame_is_rejected_and_resent() {
    let stream = update_stream(1, IMAGE);
    let mut input = stream[..UpdateMetadata::SIZE].to_vec();
    input.extend_from_slice(&[0, 3, 9, 9, 9]);
    input.extend_from_slice(&stream[UpdateMetadata::SIZE..]);
    let (terminal, board) = run(provisioned(&input), LOAD);

    assert!(matches!(terminal, Terminal::Updated(_)));
    assert_eq!(board.host.output(), &[b'U', OK, ERROR, OK, OK, OK]);
    assert_eq!(board.debug.output(), &[3, 16, 0, b'P', 0, 0]);
    assert_eq!(&board.flash.page(0)[..16], IMAGE);
}

#[test]
fn oversized_image_is_refused() {
    let (terminal, mut board) = run(provisioned(&metadata(1, 0xf000)), LOAD);
    assert_eq!(terminal, Terminal::Halted(Fault::ImageTooLarge));
    assert_eq!(board.host.output(), &[b'U', ERROR]);
    assert_eq!(board.state.firmware_size(), 0);
}

#[test]
fn credential_page_is_out_of_reach() {
    let image = vec![0xaa; APP_REGION_SIZE as usize + FRAME_PAYLOAD_SIZE];
    let mut stream = update_stream(1, &image);
    stream[..UpdateMetadata::SIZE].copy_from_slice(&metadata(1, 16));
    let (terminal, board) = run(provisioned(&stream), LOAD);

    assert_eq!(terminal, Terminal::Halted(Fault::AddressOutOfRange));
    assert_eq!(board.host.output().last(), Some(&ERROR));
    assert_eq!(board.flash.commits().len(), 1 + CREDENTIAL_PAGE_ADDR as usize / PAGE_SIZE);
    assert_eq!(&board.flash.page(CREDENTIAL_PAGE_ADDR)[..KEY_SIZE], &enrollment().password_hash[..KEY_SIZE]);
}

#[test]
fn flash_failure_halts() {
    let mut board = provisioned(&update_stream(1, IMAGE));
    board.flash.set_faulty(true);
    let (terminal, board) = run(board, LOAD);

    assert_eq!(terminal, Terminal::Halted(Fault::Flash));
    assert_eq!(board.host.output(), &[b'U', OK, OK, OK, ERROR]);
    assert_eq!(board.debug.output().last(), Some(&b'H'));
}

#[test]
fn truncated_frame_halts_without_answer() {
    let mut input = metadata(1, 16).to_vec();
    input.extend_from_slice(&[0, 16, 1, 2, 3]);
    let (terminal, board) = run(provisioned(&input), LOAD);

    assert_eq!(terminal, Terminal::Halted(Fault::Truncated));
    assert_eq!(board.host.output(), &[b'U', OK]);
    assert_eq!(board.debug.output(), &[16, b'T']);
}

#[test]
fn slow_host_keeps_watchdog_fed() {
    let board = provisioned(&[]);
    let stream = update_stream(1, IMAGE);
    let Board {
        debug,
        flash,
        state,
        watchdog,
        hasher,
        ..
    } = board;
    let host = SimSerial::new(&stream).with_stalls(500);
    let board = Board::<Sim> {
        host,
        debug,
        flash,
        state,
        watchdog,
        hasher,
    };
    let (terminal, board) = run(board, LOAD);

    assert!(matches!(terminal, Terminal::Updated(_)));
    assert!(board.watchdog.pets() > 500);
}

#[test]
fn session_walks_every_page() {
    let image: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
    let mut board = provisioned(&update_stream(3, &image));
    let mut session = UpdateSession::new();
    assert_eq!(session.state(), SessionState::AwaitMetadata);

    let report = session.run(&mut board).unwrap();
    assert_eq!(report.pages, 2);
    assert_eq!(session.state(), SessionState::ImageComplete);
    assert_eq!(session.address(), 2 * PAGE_SIZE as u32);
}

#[test]
fn failed_session_clears_installed_size() {
    let image: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();
    let mut stream = update_stream(3, &image);
    corrupt_second_page(&mut stream);
    let mut board = provisioned(&stream);
    board.state.set_firmware_size(0x20);

    let mut session = UpdateSession::new();
    assert_eq!(session.run(&mut board), Err(Fault::PageSignature));
    assert_eq!(session.state(), SessionState::PageComplete);
    assert_eq!(session.address(), PAGE_SIZE as u32);
    // The first page went in, but the image is not marked installed.
    assert_eq!(board.flash.page(0), &image[..PAGE_SIZE]);
    assert_eq!(board.state.firmware_size(), 0);
    assert_eq!(board.state.firmware_version(), 3);
}
