// SPDX-License-Identifier: Apache-2.0

use crate::backend::Backend;
use crate::config::Config;
use crate::driver::{measure, Monitor};
use crate::enclave::Lifecycle;

use anyhow::{anyhow, Context};
use log::{debug, error};

/// Create the enclave, make the secure call with `monitor` armed and tear
/// the enclave down again.
///
/// The driver session behind `monitor` must already be open. The enclave is
/// destroyed whenever it was created, even if the monitor could not be
/// armed or the secure call failed. Any error here means a non-zero exit.
pub fn run<M>(backend: &dyn Backend, monitor: &mut M, config: &Config) -> anyhow::Result<i64>
where
    M: Monitor + ?Sized,
{
    let mut lifecycle = Lifecycle::new(backend, config);
    lifecycle
        .initialize()
        .context("Fail to initialize an enclave")?;

    let outcome = {
        let enclave = lifecycle
            .enclave()
            .ok_or_else(|| anyhow!("enclave is gone after initialization"))?;

        debug!("secure call into enclave {}", enclave.id());
        measure(monitor, config.settle, || lifecycle.call(enclave))
    };

    let destroyed = lifecycle.destroy();
    debug!("enclave lifecycle ended in {:?}", lifecycle.state());

    let value = outcome
        .context("failed to arm the monitor")?
        .map_err(|status| {
            error!("Error: secure call failed (status {})", status);
            anyhow!("secure call failed with status {}", status)
        })?;

    destroyed
        .map_err(|status| anyhow!("failed to destroy the enclave (status {})", status))?;

    Ok(value)
}
