#![forbid(unsafe_code)]

//! Import ("commit") pipeline.
//!
//! The edited geometry and metadata are written next to each other under the
//! edited directory, the conversion step is asked to import them with its
//! stderr sent to a fresh log, and the log decides the outcome: empty means
//! success, anything else is a failure described by its first `...Error`
//! line. The two temporary files are removed whatever happens once the
//! write phase has started. The error log is kept for the data steward.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::request::StoreRequest;
use crate::service::PersistenceService;

fn error_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Z][a-z]*Error").expect("static pattern compiles"))
}

/// Where import artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub edited_dir: String,
    pub error_log_dir: String,
    /// Contact named in failure messages.
    pub data_steward: Option<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            edited_dir: "data/edited".to_string(),
            error_log_dir: "errorLogs".to_string(),
            data_steward: None,
        }
    }
}

/// Paths used by one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPaths {
    pub geojson: String,
    pub track_info: String,
    pub error_log: String,
}

impl ImportPaths {
    pub fn for_file(settings: &ImportSettings, name: &str, millis: i64) -> Self {
        let edited = settings.edited_dir.trim_end_matches('/');
        let logs = settings.error_log_dir.trim_end_matches('/');
        Self {
            geojson: format!("{edited}/{name}.geojson"),
            track_info: format!("{edited}/{name}_track_info.json"),
            error_log: format!("{logs}/{name}_{millis}.err"),
        }
    }
}

/// What the conversion step reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Empty error log; `message` is the service's reply.
    Imported { message: String },
    /// Non-empty error log.
    Failed { error: String, log: String },
}

impl ImportOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }

    /// Message for the operator.
    pub fn user_message(&self, data_steward: Option<&str>) -> String {
        match self {
            Self::Imported { message } => {
                let message = message.replace('\t', "");
                let message = message.trim();
                if message.is_empty() {
                    "Import succeeded".to_string()
                } else {
                    message.to_string()
                }
            }
            Self::Failed { error, .. } => {
                let mut text = format!("An error occurred while trying to import the data: {error}.");
                if let Some(steward) = data_steward {
                    text.push_str(&format!(
                        " If you can't resolve this issue yourself, please contact the overflight data steward at {steward}"
                    ));
                }
                text
            }
        }
    }
}

/// Result of a full import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub paths: ImportPaths,
    pub outcome: ImportOutcome,
    /// Temporary files that could not be removed.
    pub cleanup_failures: Vec<String>,
}

/// The line of `log` that names the error.
///
/// Finds the first `XxxError` token and returns the first line starting
/// with it; falls back to the last non-empty line.
pub fn first_error_line(log: &str) -> String {
    let fallback = || {
        log.lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string()
    };
    let Some(name) = error_name_pattern().find(log).map(|m| m.as_str()) else {
        return fallback();
    };
    log.lines()
        .map(str::trim)
        .find(|line| line.starts_with(name))
        .map(str::to_string)
        .unwrap_or_else(fallback)
}

/// Run an import stamped with the current time.
pub fn run_import(
    service: &dyn PersistenceService,
    settings: &ImportSettings,
    name: &str,
    geometry: &Value,
    track_info: &Value,
) -> Result<ImportReport> {
    let millis = chrono::Utc::now().timestamp_millis();
    run_import_at(service, settings, name, geometry, track_info, millis)
}

/// Run an import whose error log is stamped with `millis`.
pub fn run_import_at(
    service: &dyn PersistenceService,
    settings: &ImportSettings,
    name: &str,
    geometry: &Value,
    track_info: &Value,
    millis: i64,
) -> Result<ImportReport> {
    let paths = ImportPaths::for_file(settings, name, millis);
    let _span = tracing::info_span!("import", file = %name).entered();

    let result = write_and_import(service, &paths, geometry, track_info);
    let cleanup_failures = cleanup(service, &paths);

    let outcome = result?;
    match &outcome {
        ImportOutcome::Imported { .. } => {
            tracing::info!(target: "trackfix.import", file = %name, "import succeeded")
        }
        ImportOutcome::Failed { error, .. } => tracing::warn!(
            target: "trackfix.import",
            file = %name,
            log = %paths.error_log,
            %error,
            "import failed"
        ),
    }
    Ok(ImportReport {
        paths,
        outcome,
        cleanup_failures,
    })
}

fn write_and_import(
    service: &dyn PersistenceService,
    paths: &ImportPaths,
    geometry: &Value,
    track_info: &Value,
) -> Result<ImportOutcome> {
    service.write_file(&paths.geojson, &serde_json::to_string(geometry)?)?;
    service.write_file(&paths.track_info, &serde_json::to_string(track_info)?)?;

    let reply = service.call(&StoreRequest::ImportData {
        geojson_string: paths.geojson.clone(),
        track_info_string: paths.track_info.clone(),
        stderr_path: paths.error_log.clone(),
    })?;
    let message = reply.into_text();

    let log = service.read_text_file(&paths.error_log)?;
    if log.trim().is_empty() {
        Ok(ImportOutcome::Imported { message })
    } else {
        Ok(ImportOutcome::Failed {
            error: first_error_line(&log),
            log,
        })
    }
}

fn cleanup(service: &dyn PersistenceService, paths: &ImportPaths) -> Vec<String> {
    let mut failures = Vec::new();
    for path in [&paths.geojson, &paths.track_info] {
        match service.delete_file(path) {
            Ok(()) => {}
            // Never written.
            Err(StoreError::Rejected { .. }) => {}
            Err(error) => {
                tracing::warn!(target: "trackfix.import", %path, %error, "temporary file not removed");
                failures.push(path.clone());
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::ScriptedService;
    use serde_json::json;

    #[test]
    fn paths_follow_settings() {
        let paths = ImportPaths::for_file(&ImportSettings::default(), "abc", 1700);
        assert_eq!(paths.geojson, "data/edited/abc.geojson");
        assert_eq!(paths.track_info, "data/edited/abc_track_info.json");
        assert_eq!(paths.error_log, "errorLogs/abc_1700.err");
    }

    #[test]
    fn first_error_line_picks_named_error() {
        let log = "Traceback (most recent call last):\n  File \"x.py\", line 3\nValueError: bad registration\n";
        assert_eq!(first_error_line(log), "ValueError: bad registration");
    }

    #[test]
    fn first_error_line_falls_back_to_last_line() {
        assert_eq!(first_error_line("something odd\nreally odd\n\n"), "really odd");
    }

    #[test]
    fn successful_import_cleans_up() {
        // writeFile, writeFile, importData, readTextFile, deleteFile x2
        let service = ScriptedService::with_replies(["12", "7", "\tImported 2 tracks", "", "true", "true"]);
        let report = run_import_at(
            &service,
            &ImportSettings::default(),
            "abc",
            &json!({"type": "FeatureCollection"}),
            &json!({"registration": "N1"}),
            5,
        )
        .unwrap();
        assert!(report.outcome.is_imported());
        assert_eq!(report.outcome.user_message(None), "Imported 2 tracks");
        assert!(report.cleanup_failures.is_empty());
        assert_eq!(
            service.actions(),
            ["writeFile", "writeFile", "importData", "readTextFile", "deleteFile", "deleteFile"]
        );
    }

    #[test]
    fn non_empty_log_is_a_failure() {
        let service = ScriptedService::with_replies([
            "12",
            "7",
            "",
            "Traceback\nKeyError: 'registration'\n",
            "true",
            "true",
        ]);
        let report = run_import_at(
            &service,
            &ImportSettings::default(),
            "abc",
            &json!({}),
            &json!({}),
            5,
        )
        .unwrap();
        match &report.outcome {
            ImportOutcome::Failed { error, .. } => assert_eq!(error, "KeyError: 'registration'"),
            other => panic!("unexpected outcome {other:?}"),
        }
        let message = report.outcome.user_message(Some("steward@example.com"));
        assert!(message.contains("KeyError"));
        assert!(message.contains("steward@example.com"));
    }

    #[test]
    fn failed_write_still_cleans_up() {
        let service = ScriptedService::with_replies(["", "false", "false"]);
        let err = run_import_at(
            &service,
            &ImportSettings::default(),
            "abc",
            &json!({}),
            &json!({}),
            5,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert_eq!(service.actions(), ["writeFile", "deleteFile", "deleteFile"]);
    }
}
