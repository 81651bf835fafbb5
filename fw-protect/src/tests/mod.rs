// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    self::input::{create_file, create_file_with_suffix, KEY, KEY_HEX},
    crate::{package::UpdatePackage, ExitCode},
};


fn path(file: &tempfile::NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}

/// Protect a raw binary and read the package back.
#[test]
fn protect_binary() {
    let firmware = create_file(&input::firmware(300));
    let output = tempfile::NamedTempFile::new().unwrap();
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        path(&output),
        "--firmware-version",
        "7",
        "-m",
        "release 7",
        "-k",
        KEY_HEX,
    ]);
    assert_eq!(result.exit_code, ExitCode(0));
    assert!(result.stdout.contains("300 bytes, version 7, 2 pages"));
    assert!(result.stderr.is_empty());

    let package = UpdatePackage::from_bytes(&std::fs::read(output.path()).unwrap()).unwrap();
    assert_eq!(package.metadata.version, 7);
    assert_eq!(package.metadata.size, 300);
    package.verify(&KEY).unwrap();
}

/// Intel HEX input is flattened before protection.
#[test]
fn protect_ihex() {
    let firmware = create_file_with_suffix(input::ihex_text(&input::firmware(40)).as_bytes(), ".hex");
    let output = tempfile::NamedTempFile::new().unwrap();
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        path(&output),
        "--firmware-version",
        "1",
        "-k",
        KEY_HEX,
    ]);
    assert_eq!(result.exit_code, ExitCode(0));
    let package = UpdatePackage::from_bytes(&std::fs::read(output.path()).unwrap()).unwrap();
    assert_eq!(package.metadata.size, 40);
    assert_eq!(package.pages.len(), 1);
    assert_eq!(package.pages[0].frames.len(), 3);
}

/// The key can come from the config file.
#[test]
fn protect_key_from_config() {
    let firmware = create_file(b"firmware");
    let output = tempfile::NamedTempFile::new().unwrap();
    let config = create_file(format!("key = \"{KEY_HEX}\"\n").as_bytes());
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        path(&output),
        "--firmware-version",
        "2",
        "-c",
        path(&config),
    ]);
    assert_eq!(result.exit_code, ExitCode(0));
    let package = UpdatePackage::from_bytes(&std::fs::read(output.path()).unwrap()).unwrap();
    package.verify(&KEY).unwrap();
}

#[test]
fn protect_key_in_config_and_cli() {
    let firmware = create_file(b"firmware");
    let config = create_file(format!("key = \"{KEY_HEX}\"\n").as_bytes());
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        "out.pkg",
        "--firmware-version",
        "2",
        "-k",
        KEY_HEX,
        "-c",
        path(&config),
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("key specified in both config and cli"));
}

#[test]
fn protect_without_key() {
    let firmware = create_file(b"firmware");
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        "out.pkg",
        "--firmware-version",
        "2",
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("device key must be specified"));
}

#[test]
fn protect_with_short_key() {
    let firmware = create_file(b"firmware");
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        "out.pkg",
        "--firmware-version",
        "2",
        "-k",
        "0011",
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("device key must be 16 bytes, got 2"));
}

#[test]
fn protect_with_invalid_key_hex() {
    let firmware = create_file(b"firmware");
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        "out.pkg",
        "--firmware-version",
        "2",
        "-k",
        "not hex",
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("invalid device key hex"));
}

#[test]
fn protect_missing_input() {
    let result = test([
        "protect",
        "-i",
        "/nonexistent/firmware.bin",
        "-o",
        "out.pkg",
        "--firmware-version",
        "2",
        "-k",
        KEY_HEX,
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("failed to open input file"));
}

#[test]
fn protect_config_with_unknown_field() {
    let firmware = create_file(b"firmware");
    let config = create_file(b"secret = \"/root/key.pem\"\n");
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        "out.pkg",
        "--firmware-version",
        "2",
        "-c",
        path(&config),
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("config error"));
}

#[test]
fn version_must_fit_u16() {
    let firmware = create_file(b"firmware");
    let result = test([
        "protect",
        "-i",
        path(&firmware),
        "-o",
        "out.pkg",
        "--firmware-version",
        "70000",
        "-k",
        KEY_HEX,
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stdout.is_empty());
    assert!(!result.stderr.is_empty());
}

/// Inspect prints the metadata and checks signatures when given the key.
#[test]
fn inspect_package() {
    let package = UpdatePackage::protect(&input::firmware(600), 12, "twelve", &KEY).unwrap();
    let file = create_file(&package.to_bytes().unwrap());

    let result = test(["inspect", "-i", path(&file)]);
    assert_eq!(result.exit_code, ExitCode(0));
    assert!(result.stdout.contains("12"));
    assert!(result.stdout.contains("600"));
    assert!(result.stdout.contains(&hex::encode(package.metadata.signature)));
    assert!(result.stdout.contains(&hex::encode(package.pages[2].signature)));
    assert!(!result.stdout.contains("signatures valid"));

    let result = test(["inspect", "-i", path(&file), "-k", KEY_HEX]);
    assert_eq!(result.exit_code, ExitCode(0));
    assert!(result.stdout.contains("signatures valid"));
}

#[test]
fn inspect_with_wrong_key() {
    let package = UpdatePackage::protect(b"firmware", 1, "", &KEY).unwrap();
    let file = create_file(&package.to_bytes().unwrap());
    let result = test([
        "inspect",
        "-i",
        path(&file),
        "-k",
        "ffffffffffffffffffffffffffffffff",
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("metadata signature does not match the key"));
}

#[test]
fn inspect_garbage() {
    let file = create_file(b"\xff\xff\xff");
    let result = test(["inspect", "-i", path(&file)]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("invalid package"));
}

#[test]
fn update_without_port() {
    let file = create_file(b"");
    let result = test(["update", "--package", path(&file)]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("serial port must be specified"));
}

#[test]
fn readback_port_in_config_and_cli() {
    let config = create_file(b"port = \"/dev/ttyUSB0\"\nbaud = 9600\n");
    let result = test([
        "readback",
        "--password",
        "pw",
        "--start",
        "0x100",
        "--size",
        "16",
        "-o",
        "dump.bin",
        "-k",
        KEY_HEX,
        "-p",
        "/dev/ttyUSB1",
        "-c",
        path(&config),
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("port specified in both config and cli"));
}

#[test]
fn readback_rejects_bad_number() {
    let result = test([
        "readback",
        "--password",
        "pw",
        "--start",
        "0xzz",
        "--size",
        "16",
        "-o",
        "dump.bin",
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("invalid number"));
}

#[test]
fn enroll_rejects_long_password() {
    let long = "x".repeat(40);
    let result = test([
        "enroll",
        "--password",
        &long,
        "-k",
        KEY_HEX,
        "-p",
        "/dev/null",
    ]);
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stderr.contains("password is 40 bytes"));
}

fn test<const N: usize>(args: [&str; N]) -> Output {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = crate::main_args(
        std::iter::once("fw-protect").chain(args),
        &mut stdout,
        &mut stderr,
    );
    println!("* args: {:?}", args);
    println!("* exit_code: {:?}", exit_code);
    println!("* stdout:\n{}", String::from_utf8_lossy(&stdout));
    println!("* stderr:\n{}", String::from_utf8_lossy(&stderr));
    Output {
        exit_code,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

#[derive(Debug)]
struct Output {
    exit_code: ExitCode,
    stdout: String,
    stderr: String,
}
