// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! 64-bit block cipher used for signatures and image encryption.
//!
//! 128-bit key, 44-word key schedule, 27 ARX rounds over two 32-bit words.
//! Every function here is pure; the schedule is wiped when dropped.

use consts::{CIPHER_BLOCK_SIZE, DIGEST_SIZE, KEY_SIZE, SIGNATURE_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of words in the expanded key.
pub const SCHEDULE_WORDS: usize = 44;
/// Number of rounds applied to each block.
pub const ROUNDS: usize = 27;

const Z: [u32; SCHEDULE_WORDS] = [
    2, 2, 3, 2, 2, 3, 2, 2, 2, 3, 2, 3, 2, 2, 3, 3, 3, 2, 2, 3, 3, 2, 3, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 2, 3, 3, 2, 3, 3, 3, 2, 3, 2, 3,
];

pub type Block = [u8; CIPHER_BLOCK_SIZE];

/// Expanded round keys.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RoundKeys {
    words: [u32; SCHEDULE_WORDS],
}

impl core::fmt::Debug for RoundKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("RoundKeys(..)")
    }
}

pub fn expand_key(key: &[u8; KEY_SIZE]) -> RoundKeys {
    let mut rk = [0u32; SCHEDULE_WORDS];
    for (word, chunk) in rk.iter_mut().zip(key.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    for i in 4..SCHEDULE_WORDS {
        let mut tmp = rk[i - 1].rotate_right(3) ^ rk[i - 3];
        tmp ^= tmp.rotate_right(1);
        rk[i] = !rk[i - 4] ^ tmp ^ Z[i - 4];
    }
    RoundKeys { words: rk }
}

fn split(block: &Block) -> (u32, u32) {
    let y = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    let x = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    (x, y)
}

fn join(x: u32, y: u32) -> Block {
    let mut out = [0u8; CIPHER_BLOCK_SIZE];
    out[..4].copy_from_slice(&y.to_le_bytes());
    out[4..].copy_from_slice(&x.to_le_bytes());
    out
}

pub fn encrypt_block(block: &Block, rk: &RoundKeys) -> Block {
    let (mut x, mut y) = split(block);
    for k in &rk.words[..ROUNDS] {
        x = x.rotate_right(8).wrapping_add(y) ^ k;
        y = y.rotate_left(3) ^ x;
    }
    join(x, y)
}

pub fn decrypt_block(block: &Block, rk: &RoundKeys) -> Block {
    let (mut x, mut y) = split(block);
    for k in rk.words[..ROUNDS].iter().rev() {
        y = (x ^ y).rotate_right(3);
        x = (x ^ k).wrapping_sub(y).rotate_left(8);
    }
    join(x, y)
}

/// Turn a digest into a signature by encrypting it block by block.
pub fn sign(digest: &[u8; DIGEST_SIZE], rk: &RoundKeys) -> [u8; SIGNATURE_SIZE] {
    let mut out = [0u8; SIGNATURE_SIZE];
    for (dst, src) in out
        .chunks_exact_mut(CIPHER_BLOCK_SIZE)
        .zip(digest.chunks_exact(CIPHER_BLOCK_SIZE))
    {
        let mut block = [0u8; CIPHER_BLOCK_SIZE];
        block.copy_from_slice(src);
        dst.copy_from_slice(&encrypt_block(&block, rk));
    }
    out
}

/// Encrypt the first `segments` blocks of `buf` in place.
///
/// Segments that would run past the end of `buf` are ignored.
pub fn encrypt_in_place(buf: &mut [u8], segments: usize, rk: &RoundKeys) {
    apply_in_place(buf, segments, |b| encrypt_block(b, rk));
}

/// Decrypt the first `segments` blocks of `buf` in place.
///
/// Segments that would run past the end of `buf` are ignored.
pub fn decrypt_in_place(buf: &mut [u8], segments: usize, rk: &RoundKeys) {
    apply_in_place(buf, segments, |b| decrypt_block(b, rk));
}

fn apply_in_place(buf: &mut [u8], segments: usize, f: impl Fn(&Block) -> Block) {
    for chunk in buf.chunks_exact_mut(CIPHER_BLOCK_SIZE).take(segments) {
        let mut block = [0u8; CIPHER_BLOCK_SIZE];
        block.copy_from_slice(chunk);
        chunk.copy_from_slice(&f(&block));
    }
}
