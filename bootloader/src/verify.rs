// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Signature and digest comparison hardened against glitching.

use crate::cipher::{sign, RoundKeys};
use crate::hash::Hash256;
use consts::SIGNATURE_SIZE;
use core::hint::black_box;
use subtle::ConstantTimeEq;

/// Outcome of a security check. The discriminants differ in most bits so a
/// single flipped bit cannot turn one into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum VerificationResult {
    Valid = 0xcafebabe,
    Invalid = 0xdeadbeef,
}

impl VerificationResult {
    pub fn is_valid(self) -> bool {
        black_box(self) == VerificationResult::Valid
    }
}

/// Compare two byte strings in constant time, then once more through
/// `black_box`, and only report a match if both comparisons ran.
pub fn compare(expected: &[u8], received: &[u8]) -> VerificationResult {
    const CF1: u32 = 3;
    const CF2: u32 = 5;
    let mut control_flow_integrity_counter = 0;

    if bool::from(expected.ct_eq(received)) {
        control_flow_integrity_counter += CF1;
        if bool::from(black_box(expected).ct_eq(black_box(received))) {
            control_flow_integrity_counter += CF2;
            let cfi_counter_ptr = &control_flow_integrity_counter as *const u32;
            // SAFETY: the pointer comes from a live local.
            if unsafe { cfi_counter_ptr.read_volatile() } == CF1 + CF2 {
                return VerificationResult::Valid;
            }
        }
    }
    VerificationResult::Invalid
}

/// Check that `received` is `sign(hash(data))` under `rk`.
pub fn verify_signature(
    hasher: &impl Hash256,
    rk: &RoundKeys,
    data: &[u8],
    received: &[u8; SIGNATURE_SIZE],
) -> VerificationResult {
    let expected = sign(&hasher.hash(data), rk);
    compare(&expected, received)
}
