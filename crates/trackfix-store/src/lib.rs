#![forbid(unsafe_code)]

//! Persistence boundary for trackfix.
//!
//! Everything that leaves the process goes through a [`PersistenceService`]:
//! the remote endpoint ([`HttpStore`]) or a directory tree ([`LocalStore`]).
//! Raw text replies are classified once, in [`reply`], into
//! `Result<StoreReply, StoreError>`.

pub mod error;
pub mod http;
pub mod import;
pub mod local;
pub mod reply;
pub mod request;
pub mod service;

pub use error::{Result, StoreError};
pub use http::{HttpSettings, HttpStore};
pub use import::{ImportOutcome, ImportPaths, ImportReport, ImportSettings, run_import};
pub use local::{ImportCommand, LocalStore};
pub use reply::{EMPTY_QUERY_RESULT, StoreReply, classify};
pub use request::StoreRequest;
pub use service::PersistenceService;
