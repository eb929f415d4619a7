#![forbid(unsafe_code)]

//! Linear, cross-file command history.
//!
//! One [`CommandHistory`] serves the whole session. Entries are tagged with
//! the file they edit, so undo can switch to that file before reverting.
//!
//! # Invariants
//!
//! 1. `cursor <= entries.len()`.
//! 2. `entries[..cursor]` are undoable, `entries[cursor..]` are redoable.
//! 3. Recording truncates everything at or after `cursor`.
//! 4. `entries.len() <= config.max_depth` after any operation (unbounded by
//!    default).
//! 5. `total_bytes` equals the sum of `size_bytes()` over all entries.
//!
//! ```text
//! record(c4)        [c1, c2, c3, c4]      cursor = 4
//!                                  ^
//! undo() x2         [c1, c2 | c3, c4]     cursor = 2
//!                           ^
//! record(c5)        [c1, c2, c5]          cursor = 3   (c3, c4 dropped)
//!                              ^
//! ```

use std::fmt;

use trackfix_core::FileRegistry;

use super::command::{CommandError, EditCommand, Effect};

/// Limits for the history.
///
/// The default keeps every entry; eviction only happens when a limit is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of entries kept.
    pub max_depth: usize,
    /// Maximum total bytes across entries (0 = unlimited).
    pub max_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            max_depth,
            max_bytes,
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            max_bytes: 0,
        }
    }
}

/// A successfully applied undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub description: String,
    pub file: String,
    pub effect: Effect,
}

/// Cursor-based undo/redo history.
pub struct CommandHistory {
    entries: Vec<Box<dyn EditCommand>>,
    cursor: usize,
    config: HistoryConfig,
    total_bytes: usize,
}

impl fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("total_bytes", &self.total_bytes)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl CommandHistory {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            config,
            total_bytes: 0,
        }
    }

    /// Record an already-applied command.
    ///
    /// Drops every redoable entry, appends, and evicts the oldest entries
    /// beyond the configured limits.
    pub fn record(&mut self, cmd: Box<dyn EditCommand>) {
        for dropped in self.entries.drain(self.cursor..) {
            self.total_bytes = self.total_bytes.saturating_sub(dropped.size_bytes());
        }
        tracing::debug!(
            target: "trackfix.history",
            file = cmd.file(),
            description = cmd.description(),
            "recorded"
        );
        self.total_bytes += cmd.size_bytes();
        self.entries.push(cmd);
        self.cursor = self.entries.len();
        self.enforce_limits();
    }

    /// Revert `entries[cursor - 1]`.
    ///
    /// Returns `None` when there is nothing to undo. On error the cursor is
    /// unchanged.
    pub fn undo(&mut self, files: &mut FileRegistry) -> Option<Result<Applied, CommandError>> {
        if self.cursor == 0 {
            return None;
        }
        let cmd = &mut self.entries[self.cursor - 1];
        let result = cmd.undo(files).map(|effect| Applied {
            description: cmd.description().to_string(),
            file: cmd.file().to_string(),
            effect,
        });
        match &result {
            Ok(applied) => {
                self.cursor -= 1;
                tracing::debug!(
                    target: "trackfix.history",
                    file = %applied.file,
                    description = %applied.description,
                    cursor = self.cursor,
                    "undone"
                );
            }
            Err(error) => tracing::warn!(target: "trackfix.history", %error, "undo failed"),
        }
        Some(result)
    }

    /// Replay `entries[cursor]`.
    ///
    /// Returns `None` when there is nothing to redo. On error the cursor is
    /// unchanged.
    pub fn redo(&mut self, files: &mut FileRegistry) -> Option<Result<Applied, CommandError>> {
        let cmd = self.entries.get_mut(self.cursor)?;
        let result = cmd.redo(files).map(|effect| Applied {
            description: cmd.description().to_string(),
            file: cmd.file().to_string(),
            effect,
        });
        match &result {
            Ok(applied) => {
                self.cursor += 1;
                tracing::debug!(
                    target: "trackfix.history",
                    file = %applied.file,
                    description = %applied.description,
                    cursor = self.cursor,
                    "redone"
                );
            }
            Err(error) => tracing::warn!(target: "trackfix.history", %error, "redo failed"),
        }
        Some(result)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// File of the entry the next undo would revert.
    #[must_use]
    pub fn next_undo_file(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|c| c.file())
    }

    /// File of the entry the next redo would replay.
    #[must_use]
    pub fn next_redo_file(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(|c| c.file())
    }

    #[must_use]
    pub fn next_undo_description(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|c| c.description())
    }

    #[must_use]
    pub fn next_redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(|c| c.description())
    }

    /// Undoable descriptions, most recent first.
    pub fn undo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.entries[..self.cursor]
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.description())
            .collect()
    }

    /// Redoable descriptions, next first.
    pub fn redo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.entries[self.cursor..]
            .iter()
            .take(limit)
            .map(|c| c.description())
            .collect()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.total_bytes = 0;
    }

    /// Drop every entry tagged with `file`, keeping the cursor on the same
    /// boundary between the remaining entries.
    ///
    /// Used once a file has been committed and can no longer be edited.
    pub fn forget_file(&mut self, file: &str) -> usize {
        let mut kept = Vec::with_capacity(self.entries.len());
        let mut cursor = self.cursor;
        let mut removed = 0;
        for (index, cmd) in self.entries.drain(..).enumerate() {
            if cmd.file() == file {
                if index < self.cursor {
                    cursor -= 1;
                }
                self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                removed += 1;
            } else {
                kept.push(cmd);
            }
        }
        self.entries = kept;
        self.cursor = cursor;
        removed
    }

    fn evict_front(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let cmd = self.entries.remove(0);
        self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
        self.cursor = self.cursor.saturating_sub(1);
        tracing::debug!(
            target: "trackfix.history",
            description = cmd.description(),
            "evicted"
        );
        true
    }

    fn enforce_limits(&mut self) {
        while self.entries.len() > self.config.max_depth {
            self.evict_front();
        }
        if self.config.max_bytes > 0 {
            // Keep the newest entry even if it alone exceeds the budget.
            while self.total_bytes > self.config.max_bytes && self.entries.len() > 1 {
                self.evict_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::command::{CommandMetadata, CommandResult};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Scripted {
        meta: CommandMetadata,
        file: String,
        log: Log,
        fail: bool,
    }

    impl EditCommand for Scripted {
        fn undo(&mut self, _files: &mut FileRegistry) -> CommandResult<Effect> {
            if self.fail {
                return Err(CommandError::InvalidState("scripted failure".into()));
            }
            self.log.lock().unwrap().push(format!("undo {}", self.meta.description));
            Ok(Effect::None)
        }

        fn redo(&mut self, _files: &mut FileRegistry) -> CommandResult<Effect> {
            if self.fail {
                return Err(CommandError::InvalidState("scripted failure".into()));
            }
            self.log.lock().unwrap().push(format!("redo {}", self.meta.description));
            Ok(Effect::None)
        }

        fn file(&self) -> &str {
            &self.file
        }

        fn metadata(&self) -> &CommandMetadata {
            &self.meta
        }

        fn size_bytes(&self) -> usize {
            std::mem::size_of::<Self>() + self.meta.size_bytes()
        }
    }

    fn logged(log: &Log, file: &str, name: &str) -> Box<dyn EditCommand> {
        Box::new(Scripted {
            meta: CommandMetadata::new(name),
            file: file.into(),
            log: log.clone(),
            fail: false,
        })
    }

    fn failing(log: &Log, name: &str) -> Box<dyn EditCommand> {
        Box::new(Scripted {
            meta: CommandMetadata::new(name),
            file: "f".into(),
            log: log.clone(),
            fail: true,
        })
    }

    #[test]
    fn test_new_history() {
        let history = CommandHistory::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.cursor(), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_undo_redo_move_cursor() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        history.record(logged(&log, "a", "one"));
        history.record(logged(&log, "b", "two"));
        assert_eq!(history.cursor(), 2);

        let applied = history.undo(&mut files).unwrap().unwrap();
        assert_eq!(applied.file, "b");
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.next_redo_file(), Some("b"));
        assert_eq!(history.next_undo_file(), Some("a"));

        history.redo(&mut files).unwrap().unwrap();
        assert_eq!(history.cursor(), 2);
        assert_eq!(*log.lock().unwrap(), ["undo two", "redo two"]);
    }

    #[test]
    fn test_empty_undo_and_redo_are_none() {
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        assert!(history.undo(&mut files).is_none());
        assert!(history.redo(&mut files).is_none());
    }

    #[test]
    fn test_record_truncates_at_cursor() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        for name in ["a", "b", "c"] {
            history.record(logged(&log, "f", name));
        }
        history.undo(&mut files);
        history.undo(&mut files);
        history.record(logged(&log, "f", "d"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.undo_descriptions(10), ["d", "a"]);
    }

    #[test]
    fn test_failed_undo_keeps_cursor() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        history.record(failing(&log, "broken"));
        assert!(history.undo(&mut files).unwrap().is_err());
        assert_eq!(history.cursor(), 1);
        assert!(history.can_undo());
    }

    #[test]
    fn test_max_depth_enforced() {
        let log = Log::default();
        let mut history = CommandHistory::new(HistoryConfig::new(3, 0));
        for i in 0..5 {
            history.record(logged(&log, "f", &format!("cmd{i}")));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 3);
        assert_eq!(history.undo_descriptions(10), ["cmd4", "cmd3", "cmd2"]);
    }

    #[test]
    fn test_byte_limit_keeps_newest() {
        let log = Log::default();
        let mut history = CommandHistory::new(HistoryConfig::new(100, 1));
        for i in 0..5 {
            history.record(logged(&log, "f", &format!("cmd{i}")));
        }
        assert_eq!(history.len(), 1);
        assert_eq!(history.next_undo_description(), Some("cmd4"));
    }

    #[test]
    fn test_descriptions() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        history.record(logged(&log, "f", "a"));
        history.record(logged(&log, "f", "b"));
        history.undo(&mut files);
        assert_eq!(history.next_undo_description(), Some("a"));
        assert_eq!(history.next_redo_description(), Some("b"));
        assert_eq!(history.redo_descriptions(5), ["b"]);
    }

    #[test]
    fn test_memory_tracking() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::new(HistoryConfig::unlimited());
        history.record(logged(&log, "f", "a"));
        let after_one = history.memory_usage();
        assert!(after_one > 0);
        history.undo(&mut files);
        assert_eq!(history.memory_usage(), after_one);
        history.record(logged(&log, "f", "b"));
        assert_eq!(history.memory_usage(), after_one);
    }

    #[test]
    fn test_forget_file_keeps_boundary() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        history.record(logged(&log, "a", "a1"));
        history.record(logged(&log, "b", "b1"));
        history.record(logged(&log, "a", "a2"));
        history.record(logged(&log, "b", "b2"));
        history.undo(&mut files);
        // [a1, b1, a2 | b2]
        assert_eq!(history.forget_file("a"), 2);
        // [b1 | b2]
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.next_undo_description(), Some("b1"));
        assert_eq!(history.next_redo_description(), Some("b2"));
    }

    #[test]
    fn test_clear() {
        let log = Log::default();
        let mut history = CommandHistory::default();
        history.record(logged(&log, "f", "a"));
        history.clear();
        assert!(!history.can_undo());
        assert_eq!(history.memory_usage(), 0);
    }

    #[test]
    fn test_default_keeps_every_entry() {
        let log = Log::default();
        let mut files = FileRegistry::new();
        let mut history = CommandHistory::default();
        for i in 0..250 {
            history.record(logged(&log, "f", &format!("cmd{i}")));
        }
        assert_eq!(history.len(), 250);
        assert_eq!(history.cursor(), 250);
        let mut undone = 0;
        while let Some(result) = history.undo(&mut files) {
            result.unwrap();
            undone += 1;
        }
        assert_eq!(undone, 250);
    }

    #[test]
    fn test_debug_impl() {
        let history = CommandHistory::default();
        let text = format!("{history:?}");
        assert!(text.contains("CommandHistory"));
        assert!(text.contains("cursor"));
    }
}
