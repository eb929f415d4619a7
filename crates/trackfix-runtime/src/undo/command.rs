#![forbid(unsafe_code)]

//! Reversible edit commands.
//!
//! An [`EditCommand`] captures everything needed to revert and replay one
//! model edit. Commands do not hold references into the model; they name
//! their file and resolve tracks by *anchor* (the global id of a track's
//! first vertex) every time they run, so they keep working after other
//! edits renumber tracks.
//!
//! # Invariants
//!
//! - `redo()` after `undo()` reproduces the edited state up to track ids
//!   (a replayed split may allocate a different id).
//! - `undo()` after `redo()` restores the pre-edit state exactly.
//! - A failing `undo()`/`redo()` leaves the model untouched.

use std::fmt;
use std::time::Instant;

use thiserror::Error;
use trackfix_core::{FileRegistry, GlobalId, ModelError};

/// Who triggered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Direct operator action.
    #[default]
    User,
    /// Issued by application code.
    Programmatic,
    /// Replayed from an edit script.
    Macro,
}

/// Metadata attached to every command for tracing and UI display.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Human-readable description (e.g. "Split track 2").
    pub description: String,
    /// When the command was created.
    pub timestamp: Instant,
    pub source: CommandSource,
}

impl CommandMetadata {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            timestamp: Instant::now(),
            source: CommandSource::User,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }

    /// Size in bytes for memory accounting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.description.len()
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new("Unknown")
    }
}

/// Errors raised while reverting or replaying a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No track in the file starts at the recorded anchor.
    #[error("no track in file {file} starts at vertex {anchor}")]
    AnchorNotFound { file: String, anchor: GlobalId },

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model no longer matches what the command recorded.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type CommandResult<T = ()> = Result<T, CommandError>;

/// File-level side effect of running a command.
///
/// The history applies commands to the registry; the session turns these
/// into file activation and persistence requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    None,
    /// The file lost its last track and left the registry.
    FileRemoved {
        file: String,
        source_path: String,
        /// Registry index the file occupied.
        index: usize,
        /// Whether the backing resource still needs a delete request.
        delete_backing: bool,
    },
    /// A removed file was put back into the registry (in memory only).
    FileRestored { file: String },
}

/// A reversible edit that can be undone and redone.
pub trait EditCommand: Send {
    /// Revert the edit.
    fn undo(&mut self, files: &mut FileRegistry) -> CommandResult<Effect>;

    /// Replay the edit after it was undone.
    fn redo(&mut self, files: &mut FileRegistry) -> CommandResult<Effect>;

    /// Name of the file the edit applies to.
    fn file(&self) -> &str;

    fn metadata(&self) -> &CommandMetadata;

    /// Human-readable description for UI display.
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Size of this command in bytes for memory budgeting.
    fn size_bytes(&self) -> usize;

    fn debug_name(&self) -> &'static str {
        "EditCommand"
    }
}

impl fmt::Debug for dyn EditCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("file", &self.file())
            .field("description", &self.description())
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}
