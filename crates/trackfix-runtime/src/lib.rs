#![forbid(unsafe_code)]

//! Editing engine for trackfix.
//!
//! # Layers
//!
//! - [`engine`]: split and delete, each producing an [`undo::EditCommand`].
//! - [`undo`]: the linear, cross-file [`CommandHistory`].
//! - [`view`]: selection and the projection of a file into [`ViewUpdate`]s.
//! - [`dispatch`]: background persistence requests.
//! - [`session`]: [`EditorSession`], which ties the above to a
//!   persistence service.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackfix_core::TrackId;
//! use trackfix_runtime::{AutoConfirm, EditorSession, SessionConfig, view::RecordingSink};
//! use trackfix_store::LocalStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(LocalStore::new("/srv/tracks"));
//! let mut session = EditorSession::inline(store, SessionConfig::default(), RecordingSink::new());
//! session.refresh_file_list()?;
//! session.open_file("flight_0042")?;
//! session.split(TrackId(0), 120)?;
//! session.undo()?;
//! session.delete_track(Some(TrackId(0)), &mut AutoConfirm(true))?;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod session;
pub mod undo;
pub mod view;

pub use dispatch::{Completion, Dispatcher};
pub use error::{EditError, Result};
pub use session::{
    AutoConfirm, CommitOutcome, ConfirmPrompt, Confirmer, DeleteOutcome, EditorSession, Notice,
    NoticeLevel, SessionConfig,
};
pub use undo::{Applied, CommandHistory, HistoryConfig};
pub use view::{LegendRow, MapView, ViewSink, ViewUpdate};
