#![forbid(unsafe_code)]

//! Ordered registry of the files available for editing.
//!
//! The order is the file menu order; it decides which file becomes active
//! when the current one disappears (next, else previous, else none).

use crate::error::ModelError;
use crate::model::TrackFile;

/// Load state of a registry entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FileState {
    /// Known from the file listing, not read yet.
    Listed,
    /// Read and parsed; edits live here.
    Loaded(TrackFile),
}

/// One entry of the file menu.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub source_path: String,
    pub state: FileState,
}

impl FileEntry {
    pub fn listed(name: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            state: FileState::Listed,
        }
    }

    pub fn loaded(file: TrackFile) -> Self {
        Self {
            name: file.name.clone(),
            source_path: file.source_path.clone(),
            state: FileState::Loaded(file),
        }
    }

    pub fn file(&self) -> Option<&TrackFile> {
        match &self.state {
            FileState::Loaded(file) => Some(file),
            FileState::Listed => None,
        }
    }

    pub fn file_mut(&mut self) -> Option<&mut TrackFile> {
        match &mut self.state {
            FileState::Loaded(file) => Some(file),
            FileState::Listed => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, FileState::Loaded(_))
    }
}

/// Ordered collection of file entries keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRegistry {
    entries: Vec<FileEntry>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listed entry unless one with the same name exists.
    ///
    /// Returns `true` when a new entry was appended.
    pub fn list(&mut self, name: impl Into<String>, source_path: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push(FileEntry::listed(name, source_path));
        true
    }

    /// Store a loaded file, replacing its listed entry or appending.
    pub fn insert_loaded(&mut self, file: TrackFile) {
        match self.index_of(&file.name) {
            Some(index) => self.entries[index] = FileEntry::loaded(file),
            None => self.entries.push(FileEntry::loaded(file)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Loaded file by name.
    pub fn get(&self, name: &str) -> Result<&TrackFile, ModelError> {
        let entry = self.entry(name).ok_or_else(|| ModelError::FileNotFound {
            file: name.to_string(),
        })?;
        entry.file().ok_or_else(|| ModelError::FileNotLoaded {
            file: name.to_string(),
        })
    }

    /// Loaded file by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut TrackFile, ModelError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| ModelError::FileNotFound {
                file: name.to_string(),
            })?;
        entry.file_mut().ok_or_else(|| ModelError::FileNotLoaded {
            file: name.to_string(),
        })
    }

    /// Remove an entry, returning its former index.
    pub fn remove(&mut self, name: &str) -> Option<(usize, FileEntry)> {
        let index = self.index_of(name)?;
        Some((index, self.entries.remove(index)))
    }

    /// Put an entry back at (at most) its former index.
    pub fn reinsert(&mut self, index: usize, entry: FileEntry) {
        if let Some(existing) = self.index_of(&entry.name) {
            self.entries[existing] = entry;
            return;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
    }

    /// Which entry takes over after the entry at `index` was removed:
    /// the next one if present, else the previous one, else none.
    pub fn neighbor_after_removal(&self, index: usize) -> Option<&FileEntry> {
        self.entries
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|i| self.entries.get(i)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
