#![forbid(unsafe_code)]

//! Line-oriented edit scripts.
//!
//! One command per line; blank lines and `#` comments are ignored.
//!
//! ```text
//! # cut the taxi leg off and drop it
//! split 0 118
//! delete 1
//! unlock
//! set aircraft_type C206
//! import
//! ```

use trackfix_core::{GlobalId, InfoField, TrackId};
use trackfix_runtime::{
    CommitOutcome, Confirmer, DeleteOutcome, EditError, EditorSession, ViewSink,
};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Open(String),
    Split { track: TrackId, vertex: GlobalId },
    /// Delete a track, or the selected one.
    Delete(Option<TrackId>),
    Undo,
    Redo,
    Select(TrackId),
    Deselect,
    Hide(TrackId),
    Show(TrackId),
    Lock,
    Unlock,
    /// Set a track info field on every track.
    Set { field: InfoField, value: String },
    SetTrack {
        track: TrackId,
        field: InfoField,
        value: String,
    },
    Import,
}

/// A parsed command and the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: ScriptCommand,
}

fn track_arg(word: Option<&str>) -> std::result::Result<TrackId, String> {
    let word = word.ok_or("missing track id")?;
    word.parse::<u32>()
        .map(TrackId)
        .map_err(|_| format!("{word:?} is not a track id"))
}

fn field_arg(word: Option<&str>) -> std::result::Result<InfoField, String> {
    let word = word.ok_or("missing field name")?;
    InfoField::from_key(word).ok_or_else(|| {
        let known: Vec<_> = InfoField::ALL.iter().map(|f| f.key()).collect();
        format!("unknown field {word:?} (expected one of {})", known.join(", "))
    })
}

fn no_more(words: &mut std::str::SplitWhitespace<'_>) -> std::result::Result<(), String> {
    match words.next() {
        Some(extra) => Err(format!("unexpected argument {extra:?}")),
        None => Ok(()),
    }
}

/// Parse one line. `Ok(None)` for blank lines and comments.
pub fn parse_line(text: &str) -> std::result::Result<Option<ScriptCommand>, String> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let mut words = rest.split_whitespace();

    let command = match verb {
        "open" => {
            let name = words.next().ok_or("missing file name")?;
            ScriptCommand::Open(name.to_string())
        }
        "split" => {
            let track = track_arg(words.next())?;
            let vertex = words.next().ok_or("missing vertex id")?;
            let vertex = vertex
                .parse::<GlobalId>()
                .map_err(|_| format!("{vertex:?} is not a vertex id"))?;
            ScriptCommand::Split { track, vertex }
        }
        "delete" => match words.next() {
            Some(word) => ScriptCommand::Delete(Some(track_arg(Some(word))?)),
            None => ScriptCommand::Delete(None),
        },
        "undo" => ScriptCommand::Undo,
        "redo" => ScriptCommand::Redo,
        "select" => ScriptCommand::Select(track_arg(words.next())?),
        "deselect" => ScriptCommand::Deselect,
        "hide" => ScriptCommand::Hide(track_arg(words.next())?),
        "show" => ScriptCommand::Show(track_arg(words.next())?),
        "lock" => ScriptCommand::Lock,
        "unlock" => ScriptCommand::Unlock,
        "set" => {
            let (field, value) = rest.trim().split_once(char::is_whitespace).unwrap_or((rest.trim(), ""));
            let field = field_arg(Some(field).filter(|f| !f.is_empty()))?;
            return Ok(Some(ScriptCommand::Set {
                field,
                value: value.trim().to_string(),
            }));
        }
        "set-track" => {
            let track = track_arg(words.next())?;
            let field = field_arg(words.next())?;
            let value: Vec<&str> = words.collect();
            return Ok(Some(ScriptCommand::SetTrack {
                track,
                field,
                value: value.join(" "),
            }));
        }
        "import" => ScriptCommand::Import,
        other => return Err(format!("unknown command {other:?}")),
    };
    no_more(&mut words)?;
    Ok(Some(command))
}

/// Parse a whole script, failing on the first bad line.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if let Some(command) = parse_line(raw).map_err(|message| CliError::script(line, message))? {
            lines.push(ScriptLine { line, command });
        }
    }
    Ok(lines)
}

/// What a script run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// One line per executed command.
    pub log: Vec<String>,
    /// Whether an `import` finished successfully.
    pub imported: bool,
    /// Whether an `import` ran and failed.
    pub import_failed: bool,
}

fn at_line(line: usize, error: EditError) -> CliError {
    if error.is_user_error() {
        CliError::script(line, error.to_string())
    } else {
        CliError::Edit(error)
    }
}

/// Run `script` against the session. Stops at the first failing command.
pub fn run_script<S: ViewSink>(
    session: &mut EditorSession<S>,
    script: &[ScriptLine],
    confirmer: &mut dyn Confirmer,
) -> Result<ScriptReport> {
    let mut report = ScriptReport::default();
    for ScriptLine { line, command } in script {
        tracing::debug!(target: "trackfix.script", line, ?command, "running");
        let entry = execute(session, command, confirmer, &mut report).map_err(|e| at_line(*line, e))?;
        report.log.push(entry);
    }
    Ok(report)
}

fn execute<S: ViewSink>(
    session: &mut EditorSession<S>,
    command: &ScriptCommand,
    confirmer: &mut dyn Confirmer,
    report: &mut ScriptReport,
) -> std::result::Result<String, EditError> {
    Ok(match command {
        ScriptCommand::Open(name) => {
            session.open_file(name)?;
            format!("opened {name}")
        }
        ScriptCommand::Split { track, vertex } => {
            let spawned = session.split(*track, *vertex)?;
            format!("split track {track} at vertex {vertex}: new track {spawned}")
        }
        ScriptCommand::Delete(track) => match session.delete_track(*track, confirmer)? {
            DeleteOutcome::Cancelled => "delete cancelled".to_string(),
            DeleteOutcome::Deleted { track } => format!("deleted track {track}"),
            DeleteOutcome::FileDeleted { file } => format!("deleted the last track; {file} removed"),
        },
        ScriptCommand::Undo => match session.undo()? {
            Some(applied) => format!("undid {} ({})", applied.description, applied.file),
            None => "nothing to undo".to_string(),
        },
        ScriptCommand::Redo => match session.redo()? {
            Some(applied) => format!("redid {} ({})", applied.description, applied.file),
            None => "nothing to redo".to_string(),
        },
        ScriptCommand::Select(track) => {
            session.select(*track)?;
            format!("selected track {track}")
        }
        ScriptCommand::Deselect => {
            session.deselect()?;
            "selection cleared".to_string()
        }
        ScriptCommand::Hide(track) => {
            session.set_visible(*track, false)?;
            format!("hid track {track}")
        }
        ScriptCommand::Show(track) => {
            session.set_visible(*track, true)?;
            format!("showing track {track}")
        }
        ScriptCommand::Lock => {
            session.set_info_unlocked(false)?;
            "track info locked".to_string()
        }
        ScriptCommand::Unlock => {
            session.set_info_unlocked(true)?;
            "track info unlocked".to_string()
        }
        ScriptCommand::Set { field, value } => {
            session.edit_file_info(*field, value)?;
            format!("{} = {value:?}", field.key())
        }
        ScriptCommand::SetTrack {
            track,
            field,
            value,
        } => {
            session.edit_track_info(*track, *field, value)?;
            format!("track {track}: {} = {value:?}", field.key())
        }
        ScriptCommand::Import => match session.commit(confirmer)? {
            CommitOutcome::Cancelled => "import cancelled".to_string(),
            CommitOutcome::Finished(result) if result.outcome.is_imported() => {
                report.imported = true;
                "imported".to_string()
            }
            CommitOutcome::Finished(_) => {
                report.import_failed = true;
                "import failed".to_string()
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_skips_comments() {
        let script = parse_script(
            "# header\n\nsplit 0 12\ndelete\ndelete 3\nset aircraft_type Cessna 206\nset-track 1 submitter_notes two words\nimport\n",
        )
        .unwrap();
        let commands: Vec<_> = script.iter().map(|l| l.command.clone()).collect();
        assert_eq!(
            commands,
            [
                ScriptCommand::Split {
                    track: TrackId(0),
                    vertex: 12
                },
                ScriptCommand::Delete(None),
                ScriptCommand::Delete(Some(TrackId(3))),
                ScriptCommand::Set {
                    field: InfoField::AircraftType,
                    value: "Cessna 206".into()
                },
                ScriptCommand::SetTrack {
                    track: TrackId(1),
                    field: InfoField::SubmitterNotes,
                    value: "two words".into()
                },
                ScriptCommand::Import,
            ]
        );
        assert_eq!(script[0].line, 3);
    }

    #[test]
    fn set_without_value_clears_the_field() {
        assert_eq!(
            parse_line("set registration").unwrap(),
            Some(ScriptCommand::Set {
                field: InfoField::Registration,
                value: String::new()
            })
        );
    }

    #[test]
    fn errors_name_the_line() {
        let err = parse_script("undo\nsplit zero 4\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2: \"zero\" is not a track id");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_unknown_commands_and_fields() {
        assert!(parse_line("explode 1").unwrap_err().contains("unknown command"));
        assert!(parse_line("set colour red").unwrap_err().contains("unknown field"));
        assert!(parse_line("set").unwrap_err().contains("missing field"));
        assert!(parse_line("undo now").unwrap_err().contains("unexpected argument"));
        assert!(parse_line("split 0").unwrap_err().contains("missing vertex"));
    }
}
