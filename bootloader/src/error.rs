// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

/// Coarse classification of a [`Fault`], the only information about a
/// failure that leaves the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultClass {
    /// A signature, password or request hash did not match.
    Integrity,
    /// The request is authentic but not allowed.
    Policy,
    /// The serial transfer ended or broke mid-message.
    Protocol,
    /// The flash programmer or the credential store misbehaved.
    Hardware,
}

impl FaultClass {
    /// Diagnostic byte written to the debug line before halting.
    pub fn code(self) -> u8 {
        match self {
            FaultClass::Integrity => b'F',
            FaultClass::Policy => b'R',
            FaultClass::Protocol => b'T',
            FaultClass::Hardware => b'H',
        }
    }
}

/// Terminal failure of a boot-mode activity.
///
/// None of these are retried. The device reports the fault class and waits
/// for the watchdog to reset it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    MetadataSignature,
    PageSignature,
    PasswordMismatch,
    RequestHash,
    Rollback,
    AlreadyProvisioned,
    NotProvisioned,
    AddressOutOfRange,
    ImageTooLarge,
    NoFirmware,
    Truncated,
    Flash,
    CredentialReadback,
}

impl Fault {
    pub fn class(&self) -> FaultClass {
        match self {
            Fault::MetadataSignature
            | Fault::PageSignature
            | Fault::PasswordMismatch
            | Fault::RequestHash => FaultClass::Integrity,
            Fault::Rollback
            | Fault::AlreadyProvisioned
            | Fault::NotProvisioned
            | Fault::AddressOutOfRange
            | Fault::ImageTooLarge
            | Fault::NoFirmware => FaultClass::Policy,
            Fault::Truncated => FaultClass::Protocol,
            Fault::Flash | Fault::CredentialReadback => FaultClass::Hardware,
        }
    }

    /// Diagnostic byte for this fault, see [`FaultClass::code`].
    pub fn code(&self) -> u8 {
        self.class().code()
    }
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MetadataSignature => write!(f, "metadata signature mismatch"),
            Self::PageSignature => write!(f, "page signature mismatch"),
            Self::PasswordMismatch => write!(f, "wrong password"),
            Self::RequestHash => write!(f, "request hash mismatch"),
            Self::Rollback => write!(f, "firmware version is older than the installed one"),
            Self::AlreadyProvisioned => write!(f, "credential already provisioned"),
            Self::NotProvisioned => write!(f, "credential not provisioned"),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::ImageTooLarge => write!(f, "image does not fit in the application region"),
            Self::NoFirmware => write!(f, "no firmware installed"),
            Self::Truncated => write!(f, "serial transfer truncated"),
            Self::Flash => write!(f, "flash programming failed"),
            Self::CredentialReadback => write!(f, "credential readback mismatch"),
        }
    }
}
