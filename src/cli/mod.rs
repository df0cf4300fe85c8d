// SPDX-License-Identifier: Apache-2.0

use crate::backend;
use crate::config::Config;
use crate::driver::Device;
use crate::run::run;

use std::str::FromStr;

use anyhow::{anyhow, Context};
use clap::{Args, Parser};
use log::info;

/// Launch the enclave and make its secure call under measurement
///
/// The launch token is cached in the invoking user's home directory. The
/// sampling driver is armed only for the duration of the secure call.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Options {
    /// Logging options
    #[clap(flatten)]
    logger: LogOptions,
}

impl Options {
    pub fn execute(self) -> anyhow::Result<()> {
        self.logger.init();

        info!("logging initialized!");
        info!("CLI opts: {:?}", self);

        let backend = backend::pick().ok_or_else(|| anyhow!("No supported backend found."))?;
        info!("using the {} backend", backend.name());

        let config = Config::default();
        info!("config: {:?}", config);

        let mut device = Device::open(&config.device).with_context(|| {
            format!(
                "Failed to open the sampling driver at {:?}; is its kernel module loaded?",
                config.device.display()
            )
        })?;

        let value = run(backend, &mut device, &config)?;
        println!("{}", value);

        info!("Successfully returned.");
        Ok(())
    }
}

/// Where diagnostics go
///
/// Only the numeric result of the secure call is written to stdout; all log
/// records default to stderr so the two can be told apart.
#[derive(Args, Debug)]
pub struct LogOptions {
    /// Raise the log level: `-v` warnings, `-vv` info, `-vvv` debug, `-vvvv` trace
    #[clap(long = "verbose", short = 'v', parse(from_occurrences))]
    verbosity: u8,

    /// `env_logger` filter directives, e.g. `enclave_bracket::driver=trace`
    #[clap(long = "log-filter")]
    log_filter: Option<String>,

    /// Log sink, "stderr" or "stdout"
    #[clap(long, default_value = "stderr")]
    log_target: LogTarget,
}

impl LogOptions {
    /// Install the global logger. Must be called at most once per process.
    pub fn init(&self) {
        env_logger::Builder::new()
            .filter_level(self.level())
            .parse_filters(self.log_filter.as_deref().unwrap_or(""))
            .target(self.log_target.into())
            .init();
    }

    fn level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stdout,
    Stderr,
}

impl FromStr for LogTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(anyhow!("unknown log target {:?}", s)),
        }
    }
}

impl From<LogTarget> for env_logger::Target {
    fn from(t: LogTarget) -> Self {
        match t {
            LogTarget::Stdout => Self::Stdout,
            LogTarget::Stderr => Self::Stderr,
        }
    }
}
