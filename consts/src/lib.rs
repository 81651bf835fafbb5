// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

/// Size of a flash memory page in bytes.
/// A page is the smallest unit that can be erased and programmed, so the update
/// session assembles exactly one page in RAM before committing it.
pub const PAGE_SIZE: usize = 256;

/// Total addressable program memory (128 KiB).
/// Readback requests must stay within `[0, FLASH_SIZE)`.
pub const FLASH_SIZE: u32 = 0x2_0000;

/// Flash page holding the device credential (hashed password followed by the device key).
/// Written exactly once during enrollment. The application region ends right below it.
pub const CREDENTIAL_PAGE_ADDR: u32 = 0xEF00;

/// Size in bytes of the usable application region, `[0, CREDENTIAL_PAGE_ADDR)`.
pub const APP_REGION_SIZE: u32 = CREDENTIAL_PAGE_ADDR;

/// Address the bootloader jumps to when handing control to the application.
pub const APP_ENTRY: u32 = 0x0000;

/// Payload carried by every data frame of the update protocol.
/// Two cipher blocks, so a page is assembled from exactly `PAGE_SIZE / FRAME_PAYLOAD_SIZE` frames.
pub const FRAME_PAYLOAD_SIZE: usize = 16;

/// Number of data frames that fill one page.
pub const FRAMES_PER_PAGE: usize = PAGE_SIZE / FRAME_PAYLOAD_SIZE;

/// Block size of the cipher, in bytes.
pub const CIPHER_BLOCK_SIZE: usize = 8;

/// Device key size, in bytes (128-bit key).
pub const KEY_SIZE: usize = 16;

/// Output size of the hash primitive.
pub const DIGEST_SIZE: usize = 32;

/// A signature is an encrypted digest, so it has the digest's size.
pub const SIGNATURE_SIZE: usize = DIGEST_SIZE;

/// Size of the plaintext password checked by the readback gate.
pub const PASSWORD_SIZE: usize = 32;

/// EEPROM offset of the 16-bit size of the installed firmware.
pub const EEPROM_FW_SIZE: u16 = 0x0000;

/// EEPROM offset of the 16-bit firmware version counter.
pub const EEPROM_FW_VERSION: u16 = 0x0002;

/// EEPROM offset of the one-byte provisioned flag.
pub const EEPROM_PROVISIONED: u16 = 0x0004;

/// Value of a blank EEPROM byte. The provisioned flag only reads as "not provisioned"
/// while it still holds this value.
pub const UNPROVISIONED: u8 = 0xFF;

/// Value written to the provisioned flag once the credential page has been sealed.
pub const PROVISIONED: u8 = 0x5A;

/// Watchdog timeout armed at the start of every mode.
pub const WATCHDOG_TIMEOUT_MS: u32 = 2000;
