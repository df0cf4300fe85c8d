// SPDX-License-Identifier: Apache-2.0

#[cfg(feature = "backend-nil")]
pub mod nil;

#[cfg(feature = "backend-sgx")]
pub mod sgx;

use crate::diag::Status;
use crate::token::LaunchToken;

use std::path::Path;

use once_cell::sync::Lazy;

/// The platform runtime which loads enclaves and calls into them
pub trait Backend: Sync + Send {
    /// The name of the backend
    fn name(&self) -> &'static str;

    /// Whether or not the platform has support for this backend
    fn have(&self) -> bool;

    /// Load and initialize the enclave image at `image`.
    ///
    /// `token` is the candidate launch token; a zeroed token asks the
    /// platform for a new one.
    fn create(&self, image: &Path, debug: bool, token: &LaunchToken) -> Result<Launch, Status>;

    /// Release the enclave `id`.
    fn destroy(&self, id: u64) -> Result<(), Status>;

    /// Invoke the secure call of enclave `id`, returning its result.
    fn call(&self, id: u64) -> Result<i64, Status>;
}

/// A successfully created enclave as reported by the loader
#[derive(Clone, Debug)]
pub struct Launch {
    /// The enclave identifier
    pub id: u64,

    /// The launch token after creation
    pub token: LaunchToken,

    /// Whether the loader replaced the candidate token
    pub updated: bool,
}

pub static BACKENDS: Lazy<Vec<Box<dyn Backend>>> = Lazy::new(|| {
    vec![
        #[cfg(feature = "backend-sgx")]
        Box::new(sgx::Backend),
        #[cfg(feature = "backend-nil")]
        Box::new(nil::Backend::default()),
    ]
});

/// Pick the first compiled-in backend supported by this platform.
pub fn pick() -> Option<&'static dyn Backend> {
    BACKENDS.iter().find(|b| b.have()).map(|b| &**b)
}
