// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Protected update packages.
//!
//! A package holds the signed metadata and the encrypted image split into
//! pages of frames, each page with the signature of its ciphertext.

use {
    bootloader::{
        cipher::{encrypt_in_place, expand_key, sign, RoundKeys},
        hash::{Hash256, Sha256},
        verify::{verify_signature, VerificationResult},
    },
    consts::{
        APP_REGION_SIZE, CIPHER_BLOCK_SIZE, FRAMES_PER_PAGE, FRAME_PAYLOAD_SIZE, KEY_SIZE, PAGE_SIZE,
        SIGNATURE_SIZE,
    },
    host_protocol::UpdateMetadata,
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub frames: Vec<[u8; FRAME_PAYLOAD_SIZE]>,
    /// `sign(hash(ciphertext))` over exactly the bytes of `frames`.
    pub signature: [u8; SIGNATURE_SIZE],
}

impl Page {
    /// A full page is signed right after its last frame; a partial one only
    /// after the end-of-image frame.
    pub fn is_full(&self) -> bool {
        self.frames.len() == FRAMES_PER_PAGE
    }

    pub fn ciphertext(&self) -> Vec<u8> {
        self.frames.concat()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePackage {
    pub metadata: UpdateMetadata,
    pub pages: Vec<Page>,
}

impl UpdatePackage {
    /// Append the NUL-terminated release message to `firmware`, encrypt and
    /// sign everything with `key`.
    pub fn protect(firmware: &[u8], version: u16, message: &str, key: &[u8; KEY_SIZE]) -> Result<Self, Error> {
        if message.as_bytes().contains(&0) {
            return Err(Error::MessageContainsNul);
        }
        let mut data = firmware.to_vec();
        data.extend_from_slice(message.as_bytes());
        data.push(0);
        let padded = data.len().div_ceil(FRAME_PAYLOAD_SIZE) * FRAME_PAYLOAD_SIZE;
        if padded > APP_REGION_SIZE as usize {
            return Err(Error::ImageTooLarge { size: padded });
        }
        data.resize(padded, 0);
        let size = u16::try_from(firmware.len()).map_err(|_| Error::ImageTooLarge { size: padded })?;

        let rk = expand_key(key);
        let segments = data.len() / CIPHER_BLOCK_SIZE;
        encrypt_in_place(&mut data, segments, &rk);

        let pages = data
            .chunks(PAGE_SIZE)
            .map(|chunk| Page {
                frames: chunk
                    .chunks_exact(FRAME_PAYLOAD_SIZE)
                    .map(|frame| {
                        let mut payload = [0u8; FRAME_PAYLOAD_SIZE];
                        payload.copy_from_slice(frame);
                        payload
                    })
                    .collect(),
                signature: sign(&Sha256.hash(chunk), &rk),
            })
            .collect::<Vec<_>>();
        tracing::debug!(size, pages = pages.len(), "image encrypted");

        Ok(Self {
            metadata: UpdateMetadata {
                version,
                size,
                signature: metadata_signature(version, key, &rk),
            },
            pages,
        })
    }

    /// Check every signature in the package against `key`.
    pub fn verify(&self, key: &[u8; KEY_SIZE]) -> Result<(), Error> {
        let rk = expand_key(key);
        if self.metadata.signature != metadata_signature(self.metadata.version, key, &rk) {
            return Err(Error::MetadataSignature);
        }
        for (index, page) in self.pages.iter().enumerate() {
            if verify_signature(&Sha256, &rk, &page.ciphertext(), &page.signature) != VerificationResult::Valid {
                return Err(Error::PageSignature(index));
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        postcard::to_stdvec(self).map_err(Error::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        postcard::from_bytes(bytes).map_err(Error::Decode)
    }
}

fn metadata_signature(version: u16, key: &[u8; KEY_SIZE], rk: &RoundKeys) -> [u8; SIGNATURE_SIZE] {
    sign(&Sha256.hash(&UpdateMetadata::signed_bytes(version, key)), rk)
}

/// Flatten an Intel HEX file into an image starting at address 0. Gaps are
/// filled with `0xFF`, like erased flash.
pub fn parse_ihex(text: &str) -> Result<Vec<u8>, Error> {
    let mut image = Vec::new();
    let mut upper_address = 0u32;
    for record in ihex::Reader::new(text) {
        match record.map_err(Error::Ihex)? {
            ihex::Record::ExtendedSegmentAddress(addr) => {
                upper_address = u32::from(addr) << 4;
            }
            ihex::Record::ExtendedLinearAddress(addr) => {
                upper_address = u32::from(addr) << 16;
            }
            ihex::Record::Data { offset, value } => {
                let address = upper_address + u32::from(offset);
                let end = address as usize + value.len();
                if end > APP_REGION_SIZE as usize {
                    return Err(Error::IhexAddress(address));
                }
                if image.len() < end {
                    image.resize(end, 0xff);
                }
                image[address as usize..end].copy_from_slice(&value);
            }
            ihex::Record::StartSegmentAddress { .. } | ihex::Record::StartLinearAddress(_) | ihex::Record::EndOfFile => {}
        }
    }
    Ok(image)
}

#[derive(Debug)]
pub enum Error {
    Decode(postcard::Error),
    Encode(postcard::Error),
    Ihex(ihex::ReaderError),
    IhexAddress(u32),
    ImageTooLarge { size: usize },
    MessageContainsNul,
    MetadataSignature,
    PageSignature(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "invalid package: {e}"),
            Error::Encode(e) => write!(f, "failed to encode package: {e}"),
            Error::Ihex(e) => write!(f, "invalid Intel HEX file: {e}"),
            Error::IhexAddress(addr) => {
                write!(f, "Intel HEX record at {addr:#06x} is outside the application region")
            }
            Error::ImageTooLarge { size } => write!(
                f,
                "image with release message is {size} bytes, the application region holds {APP_REGION_SIZE}"
            ),
            Error::MessageContainsNul => write!(f, "release message must not contain NUL bytes"),
            Error::MetadataSignature => write!(f, "metadata signature does not match the key"),
            Error::PageSignature(index) => write!(f, "signature of page {index} does not match the key"),
        }
    }
}

impl std::error::Error for Error {}
