// SPDX-License-Identifier: Apache-2.0

//! # Enclave lifecycle
//!
//! A [`Lifecycle`] walks one enclave through
//! `Uninitialized -> TokenLoaded -> Created -> Destroyed`, or ends in
//! `FailedToCreate` when the loader refuses the image.
//!
//! Initialization reads the cached launch token, hands it to the backend
//! and writes the token back only if the backend replaced it. Token cache
//! problems never fail initialization; they only force the platform to
//! issue a new token.
//!
//! # Single caller
//!
//! A `Lifecycle` owns the process' only enclave. It is meant to be driven
//! by a single caller: every state change takes `&mut self`, so there is
//! exactly one writer at a time and no locking is done. Running several
//! processes against the same token cache is not guarded against; a
//! corrupted cache only degrades to a token request on the next run.

use crate::backend::Backend;
use crate::config::Config;
use crate::diag::{self, Status};
use crate::token::TokenFile;

use log::{debug, error, warn};

/// A live enclave
///
/// Only a successful [`Lifecycle::initialize()`] hands these out.
#[derive(Debug, PartialEq, Eq)]
pub struct Enclave {
    id: u64,
}

impl Enclave {
    /// The identifier assigned by the loader
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    TokenLoaded,
    Created(Enclave),
    Destroyed,
    FailedToCreate(Status),
}

pub struct Lifecycle<'a> {
    backend: &'a dyn Backend,
    config: &'a Config,
    state: State,
}

impl<'a> Lifecycle<'a> {
    pub fn new(backend: &'a dyn Backend, config: &'a Config) -> Self {
        Self {
            backend,
            config,
            state: State::Uninitialized,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The live enclave, if any
    pub fn enclave(&self) -> Option<&Enclave> {
        match self.state {
            State::Created(ref enclave) => Some(enclave),
            _ => None,
        }
    }

    /// Create the enclave.
    ///
    /// May only be called once; later calls fail with
    /// [`Status::INVALID_STATE`] and leave the current state untouched.
    pub fn initialize(&mut self) -> Result<&Enclave, Status> {
        if self.state != State::Uninitialized {
            warn!("enclave already initialized ({:?})", self.state);
            return Err(Status::INVALID_STATE);
        }

        let file = TokenFile::load(&self.config.token);
        self.state = State::TokenLoaded;
        debug!(
            "launch token from {:?}: {:?}",
            file.path().display(),
            file.token()
        );

        let launch = match self
            .backend
            .create(&self.config.image, self.config.debug, file.token())
        {
            Ok(launch) => launch,
            Err(status) => {
                diag::report(status);
                drop(file);
                self.state = State::FailedToCreate(status);
                return Err(status);
            }
        };

        if launch.updated && file.is_open() {
            let path = file.path().to_owned();
            match file.save(&launch.token) {
                Ok(()) => debug!("saved updated launch token to {:?}", path.display()),
                Err(e) => warn!(
                    "Failed to save launch token to {:?}: {}",
                    path.display(),
                    e
                ),
            }
        }

        debug!("enclave {} created by {}", launch.id, self.backend.name());
        self.state = State::Created(Enclave { id: launch.id });
        self.enclave().ok_or(Status::UNEXPECTED)
    }

    /// Invoke the secure call of the live enclave.
    pub fn call(&self, enclave: &Enclave) -> Result<i64, Status> {
        self.backend.call(enclave.id)
    }

    /// Destroy the enclave. Does nothing unless it was created.
    pub fn destroy(&mut self) -> Result<(), Status> {
        let enclave = match std::mem::replace(&mut self.state, State::Destroyed) {
            State::Created(enclave) => enclave,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        debug!("destroying enclave {}", enclave.id);
        self.backend.destroy(enclave.id).map_err(|status| {
            diag::report(status);
            status
        })
    }
}

impl Drop for Lifecycle<'_> {
    fn drop(&mut self) {
        if self.enclave().is_some() {
            if let Err(status) = self.destroy() {
                error!("failed to destroy enclave on drop: {}", status);
            }
        }
    }
}
