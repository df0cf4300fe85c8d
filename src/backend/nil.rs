// SPDX-License-Identifier: Apache-2.0

//! A backend which only pretends to create enclaves
//!
//! Nothing runs isolated here. It stands in for the SGX runtime on hosts
//! without one so the launch token and measurement plumbing can still be
//! exercised end to end.

use crate::diag::Status;
use crate::token::LaunchToken;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use rand::RngCore;

#[derive(Default)]
pub struct Backend {
    next: AtomicU64,
    live: AtomicU64,
}

impl super::Backend for Backend {
    #[inline]
    fn name(&self) -> &'static str {
        "nil"
    }

    #[inline]
    fn have(&self) -> bool {
        true
    }

    fn create(
        &self,
        image: &Path,
        _debug: bool,
        token: &LaunchToken,
    ) -> Result<super::Launch, Status> {
        warn!(
            "nil backend: {} is not loaded, nothing runs isolated",
            image.display()
        );

        let (token, updated) = match token.is_zero() {
            true => {
                let mut fresh = LaunchToken::zeroed();
                rand::thread_rng().fill_bytes(fresh.as_mut_bytes());
                (fresh, true)
            }
            false => (token.clone(), false),
        };

        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.store(id, Ordering::SeqCst);

        Ok(super::Launch { id, token, updated })
    }

    fn destroy(&self, id: u64) -> Result<(), Status> {
        match self
            .live
            .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) if id != 0 => Ok(()),
            _ => Err(Status::INVALID_ENCLAVE_ID),
        }
    }

    fn call(&self, id: u64) -> Result<i64, Status> {
        match id != 0 && self.live.load(Ordering::SeqCst) == id {
            true => Ok(0),
            false => Err(Status::INVALID_ENCLAVE_ID),
        }
    }
}
