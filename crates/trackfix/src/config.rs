#![forbid(unsafe_code)]

//! Tool configuration.
//!
//! Loaded from TOML; every section and field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [store]
//! root = "/srv/overflights"
//! import_program = "python3"
//! import_args = ["scripts/import_track.py", "{geojson}", "{track_info}"]
//!
//! [import]
//! data_steward = "dena_flight_data@nps.gov"
//!
//! [history]
//! max_depth = 200
//!
//! [editor]
//! track_editor = "jdoe"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trackfix_runtime::{HistoryConfig, SessionConfig};
use trackfix_store::{
    HttpSettings, HttpStore, ImportCommand, ImportSettings, LocalStore, PersistenceService,
};

use crate::error::{CliError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackfixConfig {
    pub store: StoreSection,
    pub import: ImportSection,
    pub history: HistorySection,
    pub editor: EditorSection,
}

/// Where files live. Exactly one of `root` and `endpoint` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory served by the local store.
    pub root: Option<PathBuf>,
    /// URL of the remote persistence endpoint.
    pub endpoint: Option<String>,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Conversion command run by the local store on import.
    pub import_program: Option<String>,
    pub import_args: Vec<String>,
    pub import_timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            root: None,
            endpoint: None,
            connect_timeout_secs: 2,
            timeout_secs: 30,
            max_attempts: 3,
            import_program: None,
            import_args: Vec::new(),
            import_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    pub edited_dir: String,
    pub error_log_dir: String,
    /// Contact named when an import fails.
    pub data_steward: Option<String>,
}

impl Default for ImportSection {
    fn default() -> Self {
        let defaults = ImportSettings::default();
        Self {
            edited_dir: defaults.edited_dir,
            error_log_dir: defaults.error_log_dir,
            data_steward: defaults.data_steward,
        }
    }
}

/// Undo history limits. Unset means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub max_depth: Option<usize>,
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSection {
    /// Written to `track_editor` on import.
    pub track_editor: Option<String>,
    pub palette_seed: u64,
    /// Run background requests on a worker thread.
    pub background_requests: bool,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            track_editor: None,
            palette_seed: SessionConfig::default().palette_seed,
            background_requests: false,
        }
    }
}

impl TrackfixConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Problems with this configuration; empty when it is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match (&self.store.root, &self.store.endpoint) {
            (None, None) => errors.push("store.root or store.endpoint must be set".into()),
            (Some(_), Some(_)) => {
                errors.push("store.root and store.endpoint are mutually exclusive".into())
            }
            _ => {}
        }
        if let Some(endpoint) = &self.store.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            errors.push(format!("store.endpoint must be an http(s) URL, got {endpoint:?}"));
        }
        if self.store.max_attempts == 0 {
            errors.push("store.max_attempts must be > 0".into());
        }
        if self.store.timeout_secs == 0 {
            errors.push("store.timeout_secs must be > 0".into());
        }
        if self.store.import_timeout_secs == 0 {
            errors.push("store.import_timeout_secs must be > 0".into());
        }
        if self.history.max_depth == Some(0) {
            errors.push("history.max_depth must be > 0".into());
        }
        if self.history.max_bytes == Some(0) {
            errors.push("history.max_bytes must be > 0 (omit it for no limit)".into());
        }
        if self.import.edited_dir.trim().is_empty() {
            errors.push("import.edited_dir must not be empty".into());
        }
        if self.import.error_log_dir.trim().is_empty() {
            errors.push("import.error_log_dir must not be empty".into());
        }
        errors
    }

    /// Fail with every validation problem at once.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CliError::InvalidConfig(errors))
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            history: HistoryConfig::new(
                self.history.max_depth.unwrap_or(usize::MAX),
                self.history.max_bytes.unwrap_or(0),
            ),
            track_editor: self.editor.track_editor.clone(),
            import: ImportSettings {
                edited_dir: self.import.edited_dir.clone(),
                error_log_dir: self.import.error_log_dir.clone(),
                data_steward: self.import.data_steward.clone(),
            },
            palette_seed: self.editor.palette_seed,
        }
    }

    /// Build the persistence service this configuration names.
    pub fn build_service(&self) -> Result<Arc<dyn PersistenceService>> {
        self.ensure_valid()?;
        if let Some(endpoint) = &self.store.endpoint {
            let settings = HttpSettings {
                connect_timeout: Duration::from_secs(self.store.connect_timeout_secs),
                timeout: Duration::from_secs(self.store.timeout_secs),
                max_attempts: self.store.max_attempts,
                ..HttpSettings::new(endpoint.clone())
            };
            return Ok(Arc::new(HttpStore::new(settings)?));
        }
        let Some(root) = &self.store.root else {
            return Err(CliError::invalid("no store configured"));
        };
        let mut store = LocalStore::new(root.clone());
        if let Some(program) = &self.store.import_program {
            let mut command = ImportCommand::new(program.clone()).with_args(self.store.import_args.clone());
            command.timeout = Duration::from_secs(self.store.import_timeout_secs);
            store = store.with_import_command(command);
        }
        Ok(Arc::new(store))
    }
}
