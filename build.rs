// SPDX-License-Identifier: Apache-2.0
use std::env;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

const SGX_SDK: &str = "/opt/intel/sgxsdk";
const SGX_DEVICE: &str = "/dev/sgx_enclave";

fn is_char_device(path: &str) -> bool {
    fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

fn main() {
    println!("cargo:rerun-if-env-changed=SGX_SDK");
    println!("cargo:rerun-if-env-changed=ENCLAVE_U_DIR");
    println!("cargo:rustc-check-cfg=cfg(host_can_test_sgx)");

    if env::var_os("CARGO_FEATURE_BACKEND_SGX").is_some() {
        // libsgx_urts comes with the SGX SDK (or the PSW packages).
        let sdk = env::var("SGX_SDK").unwrap_or_else(|_| SGX_SDK.into());
        println!(
            "cargo:rustc-link-search=native={}",
            Path::new(&sdk).join("lib64").display()
        );

        // The untrusted ECALL proxies generated by sgx_edger8r from the
        // enclave's EDL, archived as libenclave_u.a.
        if let Ok(dir) = env::var("ENCLAVE_U_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
        println!("cargo:rustc-link-lib=static=enclave_u");

        if is_char_device(SGX_DEVICE) {
            println!("cargo:rustc-cfg=host_can_test_sgx");
        }
    }
}
