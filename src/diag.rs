// SPDX-License-Identifier: Apache-2.0

//! Loader status codes and their human readable diagnosis

use std::fmt::{self, Display, Formatter};

use log::error;

/// A status code returned by the enclave loader (`sgx_status_t`)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Status(pub u32);

impl Status {
    pub const SUCCESS: Self = Self(0x0000);
    pub const UNEXPECTED: Self = Self(0x0001);
    pub const INVALID_PARAMETER: Self = Self(0x0002);
    pub const OUT_OF_MEMORY: Self = Self(0x0003);
    pub const ENCLAVE_LOST: Self = Self(0x0004);
    pub const INVALID_STATE: Self = Self(0x0005);
    pub const INVALID_ENCLAVE: Self = Self(0x2001);
    pub const INVALID_ENCLAVE_ID: Self = Self(0x2002);
    pub const INVALID_SIGNATURE: Self = Self(0x2003);
    pub const OUT_OF_EPC: Self = Self(0x2005);
    pub const NO_DEVICE: Self = Self(0x2006);
    pub const MEMORY_MAP_CONFLICT: Self = Self(0x2007);
    pub const INVALID_METADATA: Self = Self(0x2009);
    pub const DEVICE_BUSY: Self = Self(0x200c);
    pub const INVALID_VERSION: Self = Self(0x200d);
    pub const ENCLAVE_FILE_ACCESS: Self = Self(0x200f);
    pub const INVALID_ATTRIBUTE: Self = Self(0x3002);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Convert a raw status into a `Result`
    pub fn into_result(self) -> Result<(), Self> {
        match self.is_success() {
            true => Ok(()),
            false => Err(self),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl std::error::Error for Status {}

/// The diagnosis of a loader status
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// What went wrong.
    pub mesg: &'static str,

    /// How the user may resolve the problem.
    pub hint: Option<&'static str>,
}

impl Diagnostic {
    const fn new(mesg: &'static str, hint: Option<&'static str>) -> Self {
        Self { mesg, hint }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(hint) = self.hint {
            writeln!(f, "Info: {}", hint)?;
        }

        write!(f, "Error: {}", self.mesg)
    }
}

/// Diagnosis for any status outside of the known set
pub const UNEXPECTED: Diagnostic = Diagnostic::new("Unexpected error occurred.", None);

static TABLE: &[(Status, Diagnostic)] = &[
    (Status::UNEXPECTED, UNEXPECTED),
    (
        Status::INVALID_PARAMETER,
        Diagnostic::new("Invalid parameter.", None),
    ),
    (Status::OUT_OF_MEMORY, Diagnostic::new("Out of memory.", None)),
    (
        Status::ENCLAVE_LOST,
        Diagnostic::new(
            "Power transition occurred.",
            Some("Please refer to the sample \"PowerTransition\" for details."),
        ),
    ),
    (
        Status::INVALID_ENCLAVE,
        Diagnostic::new("Invalid enclave image.", None),
    ),
    (
        Status::INVALID_ENCLAVE_ID,
        Diagnostic::new("Invalid enclave identification.", None),
    ),
    (
        Status::INVALID_SIGNATURE,
        Diagnostic::new("Invalid enclave signature.", None),
    ),
    (Status::OUT_OF_EPC, Diagnostic::new("Out of EPC memory.", None)),
    (
        Status::NO_DEVICE,
        Diagnostic::new(
            "Invalid SGX device.",
            Some("Please make sure SGX module is enabled in the BIOS, and install SGX driver afterwards."),
        ),
    ),
    (
        Status::MEMORY_MAP_CONFLICT,
        Diagnostic::new("Memory map conflicted.", None),
    ),
    (
        Status::INVALID_METADATA,
        Diagnostic::new("Invalid enclave metadata.", None),
    ),
    (
        Status::DEVICE_BUSY,
        Diagnostic::new("SGX device was busy.", None),
    ),
    (
        Status::INVALID_VERSION,
        Diagnostic::new("Enclave version was invalid.", None),
    ),
    (
        Status::INVALID_ATTRIBUTE,
        Diagnostic::new("Enclave was not authorized.", None),
    ),
    (
        Status::ENCLAVE_FILE_ACCESS,
        Diagnostic::new("Can't open enclave file.", None),
    ),
];

/// Diagnose a loader status. Unknown codes get the generic diagnosis.
pub fn describe(status: Status) -> Diagnostic {
    TABLE
        .iter()
        .find(|(s, _)| *s == status)
        .map(|(_, d)| *d)
        .unwrap_or(UNEXPECTED)
}

/// Log the diagnosis of `status` at error level.
pub fn report(status: Status) {
    error!("{} (status {})", describe(status), status);
}
