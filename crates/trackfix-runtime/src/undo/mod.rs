#![forbid(unsafe_code)]

//! Undo/redo for track edits.
//!
//! Edits are recorded as [`EditCommand`]s in a single, linear
//! [`CommandHistory`] shared by every file of the session:
//!
//! - **Reversibility**: every command can be undone and redone.
//! - **Cross-file**: entries carry their file name; the session activates
//!   that file before applying an entry.
//! - **Bounded**: a depth and byte budget evict the oldest entries.
//!
//! Commands are handed the model on every call instead of capturing it, so
//! history entries stay owned values with no borrow on the registry.

pub mod command;
pub mod history;

pub use command::{
    CommandError, CommandMetadata, CommandResult, CommandSource, EditCommand, Effect,
};
pub use history::{Applied, CommandHistory, HistoryConfig};
