// SPDX-License-Identifier: Apache-2.0

use crate::token;

use std::path::PathBuf;

/// The signed enclave image, relative to the working directory
pub const IMAGE: &str = "enclave.signed.so";

/// File name of the launch token cache
pub const TOKEN: &str = "enclave.token";

/// Character device of the sampling driver
pub const DEVICE: &str = "/dev/cachezoom";

/// Spin iterations on each side of the secure call while armed
pub const SETTLE: u32 = 2_000_000;

/// Fixed run configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// The signed enclave image to load
    pub image: PathBuf,

    /// Load the enclave in debug mode
    pub debug: bool,

    /// Where the launch token is cached
    pub token: PathBuf,

    /// The sampling driver's device node
    pub device: PathBuf,

    /// Spin iterations before and after the secure call
    pub settle: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: IMAGE.into(),
            debug: cfg!(debug_assertions),
            token: token::resolve_path(TOKEN),
            device: DEVICE.into(),
            settle: SETTLE,
        }
    }
}
