// SPDX-License-Identifier: Apache-2.0

//! Launch an SGX enclave, cache its launch token, and make its single
//! secure call while an external sampling driver is armed.

#![deny(clippy::all)]
#![warn(rust_2018_idioms)]

mod backend;
mod cli;
mod config;
mod diag;
mod driver;
mod enclave;
mod run;
mod token;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let app = cli::Options::parse();
    app.execute()
}
