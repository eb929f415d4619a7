#![forbid(unsafe_code)]

//! Filesystem-backed persistence service.
//!
//! Serves the same actions as the remote endpoint from a directory tree:
//! editable files live under `data/`, and `importData` runs a configured
//! conversion command with its stderr captured to the requested log path.
//! Replies use the same text conventions as the remote service, so the
//! shared classification in [`crate::reply`] applies unchanged.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::{Result, StoreError};
use crate::request::StoreRequest;
use crate::service::PersistenceService;

/// Placeholder replaced by the geometry path in import arguments.
pub const GEOJSON_PLACEHOLDER: &str = "{geojson}";
/// Placeholder replaced by the track info path in import arguments.
pub const TRACK_INFO_PLACEHOLDER: &str = "{track_info}";

/// External conversion command run by `importData`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCommand {
    pub program: String,
    /// Arguments; when neither placeholder appears, both paths are appended.
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ImportCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn expand_args(&self, geojson: &Path, track_info: &Path) -> Vec<String> {
        let geojson = geojson.display().to_string();
        let track_info = track_info.display().to_string();
        let has_placeholder = self
            .args
            .iter()
            .any(|a| a.contains(GEOJSON_PLACEHOLDER) || a.contains(TRACK_INFO_PLACEHOLDER));
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace(GEOJSON_PLACEHOLDER, &geojson)
                    .replace(TRACK_INFO_PLACEHOLDER, &track_info)
            })
            .collect();
        if !has_placeholder {
            args.push(geojson);
            args.push(track_info);
        }
        args
    }
}

/// Persistence service rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    data_dir: String,
    import_command: Option<ImportCommand>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            data_dir: "data".to_string(),
            import_command: None,
        }
    }

    #[must_use]
    pub fn with_import_command(mut self, command: ImportCommand) -> Self {
        self.import_command = Some(command);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store-relative path, refusing anything outside the root.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        let mut resolved = self.root.clone();
        let mut any = false;
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    any = true;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        any.then_some(resolved)
    }

    fn outside_root(relative: &str) -> String {
        format!("ERROR: path {relative:?} is outside the store root")
    }

    fn list_editable(&self) -> Result<String> {
        let dir = self.root.join(&self.data_dir);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok("[]".to_string()),
            Err(error) => return Err(StoreError::io(dir, error)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with("geojsons.json") && entry.path().is_file() {
                names.push(format!("{}/{name}", self.data_dir));
            }
        }
        names.sort();
        Ok(serde_json::to_string(&names)?)
    }

    fn read_text(&self, relative: &str) -> Result<String> {
        let Some(path) = self.resolve(relative) else {
            return Ok(Self::outside_root(relative));
        };
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Ok(format!("ERROR: {relative} does not exist"))
            }
            Err(error) => Err(StoreError::io(path, error)),
        }
    }

    fn write(&self, relative: &str, contents: &str) -> Result<String> {
        let Some(path) = self.resolve(relative) else {
            return Ok(Self::outside_root(relative));
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| StoreError::io(&path, e))?;
        Ok(contents.len().to_string())
    }

    fn delete(&self, relative: &str) -> Result<String> {
        let Some(path) = self.resolve(relative) else {
            return Ok(Self::outside_root(relative));
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok("true".to_string()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok("false".to_string()),
            Err(error) => Err(StoreError::io(path, error)),
        }
    }

    fn import(&self, geojson: &str, track_info: &str, stderr_path: &str) -> Result<String> {
        let Some(command) = &self.import_command else {
            return Ok("ERROR: no import command is configured".to_string());
        };
        if which::which(&command.program).is_err() && !Path::new(&command.program).is_file() {
            return Ok(format!(
                "ERROR: import command not found: {}",
                command.program
            ));
        }
        let (Some(geojson), Some(track_info), Some(log_path)) = (
            self.resolve(geojson),
            self.resolve(track_info),
            self.resolve(stderr_path),
        ) else {
            return Ok(Self::outside_root(stderr_path));
        };
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let log = File::create(&log_path).map_err(|e| StoreError::io(&log_path, e))?;

        let args = command.expand_args(&geojson, &track_info);
        tracing::info!(
            target: "trackfix.store",
            program = %command.program,
            ?args,
            "running import command"
        );
        let mut child = Command::new(&command.program)
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| StoreError::io(&command.program, e))?;

        let stdout = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut out) = stdout {
                let _ = out.read_to_string(&mut text);
            }
            text
        });

        let status = match child
            .wait_timeout(command.timeout)
            .map_err(|e| StoreError::io(&command.program, e))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return Ok(format!(
                    "ERROR: import command timed out after {}s",
                    command.timeout.as_secs()
                ));
            }
        };
        let stdout = reader.join().unwrap_or_default();

        if !status.success() {
            let logged = fs::metadata(&log_path).map(|m| m.len()).unwrap_or(0);
            if logged == 0 {
                let note = format!(
                    "ImportError: conversion command exited with {}\n",
                    status.code().map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
                );
                fs::write(&log_path, note).map_err(|e| StoreError::io(&log_path, e))?;
            }
        }
        Ok(stdout)
    }
}

impl PersistenceService for LocalStore {
    fn send(&self, request: &StoreRequest) -> Result<String> {
        match request {
            StoreRequest::GetFiles => self.list_editable(),
            StoreRequest::ReadTextFile { text_path } => self.read_text(text_path),
            StoreRequest::WriteFile {
                file_path,
                json_string,
            } => self.write(file_path, json_string),
            StoreRequest::DeleteFile { file_path } => self.delete(file_path),
            StoreRequest::Query { .. } | StoreRequest::ParametrizedQuery { .. } => {
                Ok("ERROR: the local store does not run database queries".to_string())
            }
            StoreRequest::ImportData {
                geojson_string,
                track_info_string,
                stderr_path,
            } => self.import(geojson_string, track_info_string, stderr_path),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
