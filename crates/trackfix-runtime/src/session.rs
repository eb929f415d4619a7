#![forbid(unsafe_code)]

//! The editing session.
//!
//! [`EditorSession`] owns everything one operator works with: the file
//! registry, the shared history, the active file, the color palette, the
//! persistence service and its dispatcher. Every operation follows the same
//! shape: validate, mutate the model, record the history entry, then
//! re-project the active file into the [`ViewSink`].
//!
//! Undo and redo first switch to the file the history entry belongs to, so
//! the operator always sees the file being changed.
//!
//! Persistence failures never roll the model back; they become [`Notice`]s.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use trackfix_core::geojson::{self, encode_feature_collection, encode_track_info};
use trackfix_core::{
    FileRegistry, GlobalId, InfoField, ModelError, Palette, TrackFile, TrackId,
};
use trackfix_store::{
    ImportReport, ImportSettings, PersistenceService, StoreError, StoreRequest, run_import,
};

use crate::dispatch::{Completion, Dispatcher};
use crate::engine;
use crate::error::{EditError, Result};
use crate::undo::{Applied, CommandHistory, CommandSource, Effect, HistoryConfig};
use crate::view::{self, LegendRow, NullSink, ViewSink, ViewUpdate};

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

/// A question the operator must answer before a destructive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPrompt {
    DeleteTrack { file: String, track: TrackId },
    /// Second prompt when the track is the last one of its file.
    DeleteLastTrack { file: String },
    ImportWithHiddenTracks { file: String, hidden: usize },
}

impl ConfirmPrompt {
    pub fn message(&self) -> String {
        match self {
            Self::DeleteTrack { .. } => {
                "Are you sure you want to delete the selected track?".to_string()
            }
            Self::DeleteLastTrack { .. } => "This is the only track left in this file. \
                 Deleting it will delete the file. Are you sure you want to continue?"
                .to_string(),
            Self::ImportWithHiddenTracks { hidden, .. } => format!(
                "There are {hidden} track segments currently hidden, but all tracks listed \
                 for this file will be imported. Are you sure you want to continue?"
            ),
        }
    }
}

/// Answers [`ConfirmPrompt`]s.
pub trait Confirmer {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool;
}

impl<F: FnMut(&ConfirmPrompt) -> bool> Confirmer for F {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool {
        self(prompt)
    }
}

/// Gives the same answer to every prompt.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool {
        tracing::debug!(target: "trackfix.session", ?prompt, answer = self.0, "auto-confirmed");
        self.0
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration and outcomes
// ---------------------------------------------------------------------------

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub history: HistoryConfig,
    /// Name written to `track_editor` on import, when set.
    pub track_editor: Option<String>,
    pub import: ImportSettings,
    /// Seed of the track color palette.
    pub palette_seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            track_editor: None,
            import: ImportSettings::default(),
            palette_seed: 0x7261_636b,
        }
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The operator declined; nothing changed.
    Cancelled,
    Deleted { track: TrackId },
    /// The last track went and took the file with it.
    FileDeleted { file: String },
}

/// Result of a commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Cancelled,
    Finished(ImportReport),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One operator's editing session.
pub struct EditorSession<S: ViewSink = NullSink> {
    files: FileRegistry,
    history: CommandHistory,
    active: Option<String>,
    palette: Palette,
    service: Arc<dyn PersistenceService>,
    dispatcher: Dispatcher,
    notices: Vec<Notice>,
    sink: S,
    config: SessionConfig,
}

impl<S: ViewSink> std::fmt::Debug for EditorSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("service", &self.service.name())
            .field("files", &self.files.len())
            .field("active", &self.active)
            .field("history", &self.history)
            .field("dispatcher", &self.dispatcher)
            .field("notices", &self.notices.len())
            .finish()
    }
}

impl<S: ViewSink> EditorSession<S> {
    pub fn new(
        service: Arc<dyn PersistenceService>,
        dispatcher: Dispatcher,
        config: SessionConfig,
        sink: S,
    ) -> Self {
        Self {
            files: FileRegistry::new(),
            history: CommandHistory::new(config.history.clone()),
            active: None,
            palette: Palette::new(config.palette_seed),
            service,
            dispatcher,
            notices: Vec::new(),
            sink,
            config,
        }
    }

    /// Session whose background requests run on the calling thread.
    pub fn inline(service: Arc<dyn PersistenceService>, config: SessionConfig, sink: S) -> Self {
        let dispatcher = Dispatcher::inline(Arc::clone(&service));
        Self::new(service, dispatcher, config, sink)
    }

    // -- accessors ----------------------------------------------------------

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_file(&self) -> Option<&TrackFile> {
        self.active.as_deref().and_then(|name| self.files.get(name).ok())
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Notices not taken yet.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Legend of the active file.
    pub fn legend(&self) -> Vec<LegendRow> {
        self.active_file().map(view::project_legend).unwrap_or_default()
    }

    fn active_key(&self) -> Result<String> {
        self.active.clone().ok_or(EditError::NoActiveFile)
    }

    fn active_mut(&mut self) -> Result<&mut TrackFile> {
        let name = self.active.as_deref().ok_or(EditError::NoActiveFile)?;
        Ok(self.files.get_mut(name)?)
    }

    // -- files --------------------------------------------------------------

    /// Ask the service for the editable files and list new ones.
    ///
    /// Returns the number of entries added.
    pub fn refresh_file_list(&mut self) -> Result<usize> {
        let paths = self.service.list_files()?;
        let mut added = 0;
        for path in &paths {
            if self.files.list(geojson::file_name_from_path(path), path.as_str()) {
                added += 1;
            }
        }
        tracing::info!(
            target: "trackfix.session",
            listed = paths.len(),
            added,
            "file list refreshed"
        );
        self.publish_files();
        Ok(added)
    }

    /// Load `name` if needed and make it the active file.
    pub fn open_file(&mut self, name: &str) -> Result<()> {
        let loaded = self.files.entry(name).is_some_and(|entry| entry.is_loaded());
        if !loaded {
            let source_path = self
                .files
                .entry(name)
                .map(|entry| entry.source_path.clone())
                .unwrap_or_else(|| geojson::source_path_for(name));
            let text = self.service.read_text_file(&source_path)?;
            let file = geojson::decode_file(name, &source_path, &text, &mut self.palette)?;
            tracing::info!(
                target: "trackfix.session",
                file = %name,
                tracks = file.track_count(),
                vertices = file.vertex_count(),
                "file loaded"
            );
            self.files.insert_loaded(file);
        }
        self.activate(Some(name.to_string()));
        Ok(())
    }

    fn activate(&mut self, name: Option<String>) {
        if self.active != name {
            tracing::debug!(target: "trackfix.session", file = ?name, "active file changed");
        }
        self.active = name;
        self.publish_files();
        self.publish_active();
    }

    /// Activate whatever took the place of the removed entry at `index`.
    fn activate_neighbor(&mut self, index: usize) {
        let Some(next) = self.files.neighbor_after_removal(index).map(|e| e.name.clone()) else {
            self.activate(None);
            return;
        };
        if let Err(error) = self.open_file(&next) {
            self.notices
                .push(Notice::error(format!("Could not open {next}: {error}")));
            self.activate(None);
        }
    }

    fn publish_files(&mut self) {
        self.sink.apply(ViewUpdate::Files {
            names: self.files.names().map(str::to_string).collect(),
            active: self.active.clone(),
        });
    }

    fn publish_active(&mut self) {
        match self.active.as_deref().and_then(|name| self.files.get(name).ok()) {
            Some(file) => view::project_file(file, &mut self.sink),
            None => self.sink.apply(ViewUpdate::Cleared),
        }
    }

    // -- edits --------------------------------------------------------------

    /// Split `track` of the active file at vertex `cut`. Returns the new id.
    pub fn split(&mut self, track: TrackId, cut: GlobalId) -> Result<TrackId> {
        let name = self.active_key()?;
        let file = self.files.get_mut(&name)?;
        let cmd = engine::split_track(file, track, cut, &mut self.palette, CommandSource::User)?;
        let spawned = cmd.spawned();
        self.history.record(Box::new(cmd));
        self.publish_active();
        Ok(spawned)
    }

    /// Delete `track`, or the selected track, after confirmation.
    pub fn delete_track(
        &mut self,
        track: Option<TrackId>,
        confirmer: &mut dyn Confirmer,
    ) -> Result<DeleteOutcome> {
        let name = self.active_key()?;
        let file = self.files.get(&name)?;
        let track = track.or(file.selected).ok_or(EditError::NoSelection)?;
        file.require(track)?;

        let prompt = ConfirmPrompt::DeleteTrack {
            file: name.clone(),
            track,
        };
        if !confirmer.confirm(&prompt) {
            return Ok(DeleteOutcome::Cancelled);
        }
        if engine::is_last_track(file, track)
            && !confirmer.confirm(&ConfirmPrompt::DeleteLastTrack { file: name.clone() })
        {
            return Ok(DeleteOutcome::Cancelled);
        }

        let (cmd, effect) = engine::delete_track(&mut self.files, &name, track, CommandSource::User)?;
        self.history.record(Box::new(cmd));
        let outcome = match effect {
            Effect::FileRemoved { .. } => DeleteOutcome::FileDeleted { file: name },
            _ => DeleteOutcome::Deleted { track },
        };
        self.apply_effect(effect);
        Ok(outcome)
    }

    /// React to an applied edit and re-project the view.
    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::None => self.publish_active(),
            Effect::FileRemoved {
                file,
                source_path,
                index,
                delete_backing,
            } => {
                if delete_backing {
                    self.dispatcher.submit(StoreRequest::delete_file(source_path));
                }
                if self.active.as_deref() == Some(file.as_str()) {
                    self.activate_neighbor(index);
                } else {
                    self.publish_files();
                    self.publish_active();
                }
            }
            Effect::FileRestored { file } => self.activate(Some(file)),
        }
    }

    /// Undo the most recent entry, switching to its file first.
    ///
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<Applied>> {
        let previous = self.active.clone();
        if let Some(file) = self.history.next_undo_file().map(str::to_string) {
            self.switch_to(file);
        }
        let applied = match self.history.undo(&mut self.files) {
            None => return Ok(None),
            Some(Ok(applied)) => applied,
            Some(Err(error)) => {
                self.switch_back(previous);
                return Err(error.into());
            }
        };
        self.apply_effect(applied.effect.clone());
        Ok(Some(applied))
    }

    /// Redo the next entry, switching to its file first.
    pub fn redo(&mut self) -> Result<Option<Applied>> {
        let previous = self.active.clone();
        if let Some(file) = self.history.next_redo_file().map(str::to_string) {
            self.switch_to(file);
        }
        let applied = match self.history.redo(&mut self.files) {
            None => return Ok(None),
            Some(Ok(applied)) => applied,
            Some(Err(error)) => {
                self.switch_back(previous);
                return Err(error.into());
            }
        };
        self.apply_effect(applied.effect.clone());
        Ok(Some(applied))
    }

    fn switch_to(&mut self, file: String) {
        let loaded = self.files.entry(&file).is_some_and(|entry| entry.is_loaded());
        if loaded && self.active.as_deref() != Some(file.as_str()) {
            self.activate(Some(file));
        }
    }

    /// Return to the file that was active before a failed history step.
    fn switch_back(&mut self, previous: Option<String>) {
        if self.active != previous {
            self.activate(previous);
        }
    }

    // -- selection ----------------------------------------------------------

    pub fn select(&mut self, track: TrackId) -> Result<()> {
        view::select(self.active_mut()?, track)?;
        self.publish_active();
        Ok(())
    }

    pub fn deselect(&mut self) -> Result<()> {
        view::deselect(self.active_mut()?);
        self.publish_active();
        Ok(())
    }

    pub fn set_visible(&mut self, track: TrackId, visible: bool) -> Result<()> {
        view::set_visible(self.active_mut()?, track, visible)?;
        self.publish_active();
        Ok(())
    }

    // -- track info ---------------------------------------------------------

    /// Whether the active file's track info may be edited.
    pub fn info_unlocked(&self) -> bool {
        self.active_file()
            .and_then(|file| file.tracks().next())
            .is_some_and(|track| track.info.unlocked)
    }

    /// Lock or unlock the track info of every track in the active file.
    pub fn set_info_unlocked(&mut self, unlocked: bool) -> Result<()> {
        let file = self.active_mut()?;
        for track in file.tracks_mut() {
            track.info_mut().unlocked = unlocked;
        }
        Ok(())
    }

    /// Set `field` on every track of the active file.
    pub fn edit_file_info(&mut self, field: InfoField, value: &str) -> Result<()> {
        let file = self.active_mut()?;
        if !file.tracks().all(|track| track.info.unlocked) {
            return Err(EditError::InfoLocked);
        }
        for track in file.tracks_mut() {
            track.info_mut().set(field, value);
        }
        file.dirty = true;
        tracing::debug!(target: "trackfix.session", field = field.key(), "file info edited");
        Ok(())
    }

    /// Set `field` on one track of the active file.
    pub fn edit_track_info(&mut self, track: TrackId, field: InfoField, value: &str) -> Result<()> {
        let file = self.active_mut()?;
        let target = file.require_mut(track)?;
        if !target.info.unlocked {
            return Err(EditError::InfoLocked);
        }
        target.info_mut().set(field, value);
        file.dirty = true;
        Ok(())
    }

    // -- commit -------------------------------------------------------------

    /// Import the active file.
    ///
    /// On success the file leaves the registry, its history entries are
    /// dropped and the backing file is deleted. On failure the file stays
    /// as it is and a notice names the error.
    pub fn commit(&mut self, confirmer: &mut dyn Confirmer) -> Result<CommitOutcome> {
        let name = self.active_key()?;
        let file = self.files.get(&name)?;
        let first = file.tracks().next().ok_or_else(|| ModelError::EmptyFile {
            file: name.clone(),
        })?;

        let mut info = trackfix_core::TrackInfo::clone(&first.info);
        if let Some(editor) = &self.config.track_editor {
            info.track_editor = editor.clone();
        }
        let issues = info.validate();
        if !issues.is_empty() {
            return Err(EditError::InvalidInfo(issues));
        }

        let hidden = view::hidden_tracks(file).len();
        if hidden > 0
            && !confirmer.confirm(&ConfirmPrompt::ImportWithHiddenTracks {
                file: name.clone(),
                hidden,
            })
        {
            return Ok(CommitOutcome::Cancelled);
        }

        let geometry = encode_feature_collection(file);
        let track_info = encode_track_info(file, self.config.track_editor.as_deref())?;
        let source_path = file.source_path.clone();

        let report = match run_import(
            self.service.as_ref(),
            &self.config.import,
            &name,
            &geometry,
            &track_info,
        ) {
            Ok(report) => report,
            Err(error) => {
                self.notices.push(Notice::error(format!(
                    "Importing {name} failed: {error}"
                )));
                return Err(error.into());
            }
        };

        let steward = self.config.import.data_steward.as_deref();
        let message = report.outcome.user_message(steward);
        for path in &report.cleanup_failures {
            self.notices
                .push(Notice::warning(format!("Could not remove temporary file {path}")));
        }

        if report.outcome.is_imported() {
            self.notices.push(Notice::info(message));
            let forgotten = self.history.forget_file(&name);
            tracing::debug!(target: "trackfix.session", file = %name, forgotten, "history dropped");
            if let Some((index, _)) = self.files.remove(&name) {
                self.dispatcher.submit(StoreRequest::delete_file(source_path));
                self.activate_neighbor(index);
            }
        } else {
            self.notices.push(Notice::error(message));
        }
        Ok(CommitOutcome::Finished(report))
    }

    // -- background work ----------------------------------------------------

    /// Turn finished background requests into notices.
    ///
    /// Returns how many requests completed.
    pub fn poll(&mut self) -> usize {
        let completions = self.dispatcher.poll();
        self.absorb(completions)
    }

    /// Wait up to `timeout` for background requests, then [`poll`](Self::poll).
    pub fn flush(&mut self, timeout: Duration) -> usize {
        let completions = self.dispatcher.drain(timeout);
        self.absorb(completions)
    }

    /// Background requests not yet polled.
    pub fn pending_requests(&self) -> usize {
        self.dispatcher.pending()
    }

    fn absorb(&mut self, completions: Vec<Completion>) -> usize {
        let count = completions.len();
        for Completion { request, result } in completions {
            let Err(error) = result else {
                continue;
            };
            self.notices.push(Notice::error(failure_message(&request, &error)));
        }
        count
    }
}

fn failure_message(request: &StoreRequest, error: &StoreError) -> String {
    match request {
        StoreRequest::DeleteFile { file_path } => format!(
            "problem deleting file {file_path}. This file will have to be manually deleted."
        ),
        other => format!("{} failed: {error}", other.summary()),
    }
}
