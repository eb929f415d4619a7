#![forbid(unsafe_code)]

//! Log output for the command-line tool.
//!
//! Logs go to stderr so command output on stdout stays machine readable.
//! `RUST_LOG` wins over the verbosity flag.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,trackfix=info",
        1 => "info,trackfix=debug",
        _ => "debug",
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
