// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::*;
use crate::Fault;
use consts::APP_ENTRY;

/// Keep flash and EEPROM, fresh host line, debug line and watchdog.
fn power_cycle(board: Board<Sim>) -> Board<Sim> {
    let Board { flash, state, hasher, .. } = board;
    Board::<Sim> {
        host: SimSerial::new(&[]),
        debug: crate::sim::SimLine::new(),
        flash,
        state,
        watchdog: crate::sim::SimWatchdog::new(),
        hasher,
    }
}

#[test]
fn jumps_after_release_message() {
    let mut board = provisioned(&[]);
    board.state.set_firmware_size(16);
    board.flash.load(0, &[0x11; 16]);
    board.flash.load(16, b"release 1.0\0garbage");
    let (terminal, board) = run(board, NONE);

    assert_eq!(terminal, Terminal::Boot { entry: APP_ENTRY });
    assert_eq!(board.host.output(), b"B");
    assert_eq!(board.debug.output(), b"release 1.0\0");
    assert!(!board.watchdog.is_armed());
    assert!(!board.watchdog.fired());
}

#[test]
fn no_firmware_halts() {
    let (terminal, board) = run(provisioned(&[]), NONE);

    assert_eq!(terminal, Terminal::Halted(Fault::NoFirmware));
    assert_eq!(board.host.output(), b"B");
    assert_eq!(board.debug.output(), b"R");
    assert!(board.watchdog.fired());
}

#[test]
fn blank_size_record_halts() {
    let mut board = provisioned(&[]);
    board.state.set_firmware_size(0xffff);
    let (terminal, _) = run(board, NONE);
    assert_eq!(terminal, Terminal::Halted(Fault::NoFirmware));
}

#[test]
fn updated_image_boots_on_next_power_cycle() {
    let mut image = b"application code".to_vec();
    let size = image.len() as u16;
    image.extend_from_slice(b"v2\0");
    let mut stream = update_stream(2, &image);
    stream[..UpdateMetadata::SIZE].copy_from_slice(&metadata(2, size));
    let (terminal, board) = run(provisioned(&stream), LOAD);
    assert!(matches!(terminal, Terminal::Updated(_)));

    let (terminal, board) = run(power_cycle(board), NONE);
    assert_eq!(terminal, Terminal::Boot { entry: APP_ENTRY });
    assert_eq!(board.debug.output(), b"v2\0");
}

#[test]
fn interrupted_update_does_not_boot() {
    let image: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
    let mut stream = update_stream(2, &image);
    corrupt_second_page(&mut stream);
    let (terminal, board) = run(provisioned(&stream), LOAD);
    assert_eq!(terminal, Terminal::Halted(Fault::PageSignature));

    let (terminal, board) = run(power_cycle(board), NONE);
    assert_eq!(terminal, Terminal::Halted(Fault::NoFirmware));
    assert_eq!(board.debug.output(), b"R");
}
