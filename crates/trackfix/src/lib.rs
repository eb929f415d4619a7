#![forbid(unsafe_code)]

//! Command-line front end for trackfix.
//!
//! ```text
//! trackfix --root /srv/overflights files
//! trackfix --root /srv/overflights show flight_0042
//! trackfix --config trackfix.toml edit flight_0042 --script fixes.txt --yes
//! trackfix --config trackfix.toml import flight_0042
//! ```
//!
//! Exit codes: 0 on success, 2 for usage, config and script mistakes,
//! 3 for persistence failures, 4 when an import ran and failed, 1 otherwise.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod script;

pub use cli::{Cli, Commands, run, run_from_env};
pub use config::TrackfixConfig;
pub use error::{CliError, Result};
