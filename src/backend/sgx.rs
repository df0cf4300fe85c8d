// SPDX-License-Identifier: Apache-2.0

//! Intel SGX backend on top of the SGX SDK untrusted runtime (`libsgx_urts`)
//!
//! The secure call is the edger8r generated proxy of the enclave's single
//! ECALL, linked in from `libenclave_u.a` (see `build.rs`).

use crate::diag::Status;
use crate::token::LaunchToken;

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_long};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::null_mut;

/// `sgx_attributes_t`
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Default)]
struct Attributes {
    flags: u64,
    xfrm: u64,
}

/// `sgx_misc_attribute_t`
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Default)]
struct MiscAttribute {
    secs_attr: Attributes,
    misc_select: u32,
}

#[link(name = "sgx_urts")]
extern "C" {
    fn sgx_create_enclave(
        file_name: *const c_char,
        debug: c_int,
        launch_token: *mut [u8; LaunchToken::SIZE],
        launch_token_updated: *mut c_int,
        enclave_id: *mut u64,
        misc_attr: *mut MiscAttribute,
    ) -> u32;

    fn sgx_destroy_enclave(enclave_id: u64) -> u32;
}

extern "C" {
    fn do_something_secret(enclave_id: u64, retval: *mut c_long) -> u32;
}

/// Device nodes exposed by the in-tree and the out-of-tree SGX drivers
const DEVICES: &[&str] = &["/dev/sgx_enclave", "/dev/sgx/enclave", "/dev/isgx"];

pub struct Backend;

impl super::Backend for Backend {
    #[inline]
    fn name(&self) -> &'static str {
        "sgx"
    }

    fn have(&self) -> bool {
        DEVICES.iter().any(|dev| Path::new(dev).exists())
    }

    fn create(
        &self,
        image: &Path,
        debug: bool,
        token: &LaunchToken,
    ) -> Result<super::Launch, Status> {
        let file_name = CString::new(image.as_os_str().as_bytes())
            .map_err(|_| Status::INVALID_PARAMETER)?;

        let mut token = token.clone();
        let mut updated: c_int = 0;
        let mut id = 0u64;

        // Safety: every pointer refers to a live, correctly sized local.
        let status = Status(unsafe {
            sgx_create_enclave(
                file_name.as_ptr(),
                debug as c_int,
                token.as_mut_bytes(),
                &mut updated,
                &mut id,
                null_mut(),
            )
        });
        status.into_result()?;

        Ok(super::Launch {
            id,
            token,
            updated: updated != 0,
        })
    }

    fn destroy(&self, id: u64) -> Result<(), Status> {
        Status(unsafe { sgx_destroy_enclave(id) }).into_result()
    }

    fn call(&self, id: u64) -> Result<i64, Status> {
        let mut retval: c_long = 0;
        Status(unsafe { do_something_secret(id, &mut retval) }).into_result()?;
        Ok(retval.into())
    }
}

#[cfg(all(test, host_can_test_sgx))]
mod tests {
    use super::super::Backend as _;
    use super::*;

    #[test]
    fn fail_to_create_enclave_with_non_existent_file() {
        let status = Backend
            .create(
                Path::new("does_not_exist.signed.so"),
                true,
                &LaunchToken::zeroed(),
            )
            .unwrap_err();

        assert_eq!(status, Status::ENCLAVE_FILE_ACCESS);
    }

    #[test]
    fn nul_in_path_is_rejected() {
        let status = Backend
            .create(Path::new("bad\0.so"), true, &LaunchToken::zeroed())
            .unwrap_err();

        assert_eq!(status, Status::INVALID_PARAMETER);
    }
}
