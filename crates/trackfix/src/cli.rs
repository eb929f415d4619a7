#![forbid(unsafe_code)]

use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use trackfix_core::{GlobalId, Rgb, TrackId};
use trackfix_runtime::view::NullSink;
use trackfix_runtime::{
    AutoConfirm, CommitOutcome, ConfirmPrompt, Confirmer, Dispatcher, EditorSession, Notice,
    NoticeLevel,
};

use crate::config::TrackfixConfig;
use crate::error::{CliError, Result};
use crate::logging;
use crate::script::{parse_script, run_script};

/// How long to wait for background requests before exiting.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(
    name = "trackfix",
    about = "Split, trim and import recorded flight tracks",
    version
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serve files from this directory (overrides the config).
    #[arg(long, global = true, conflicts_with = "endpoint")]
    pub root: Option<PathBuf>,

    /// Talk to this persistence endpoint (overrides the config).
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// More log output; repeat for more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List files awaiting review.
    Files(FilesArgs),

    /// Print the tracks of a file.
    Show(ShowArgs),

    /// Apply an edit script to a file.
    Edit(EditArgs),

    /// Validate a file's track info and import it.
    Import(ImportArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FilesArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    pub file: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    pub file: String,
    /// Script path, or `-` for stdin.
    #[arg(long, short)]
    pub script: PathBuf,
    /// Answer yes to every confirmation.
    #[arg(long, short)]
    pub yes: bool,
    /// Print the resulting file as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    pub file: String,
    /// Import even if some tracks are hidden.
    #[arg(long, short)]
    pub yes: bool,
}

/// Asks confirmation questions on a terminal.
pub struct PromptConfirmer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirmer for PromptConfirmer<R, W> {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool {
        if write!(self.output, "{} [y/N] ", prompt.message())
            .and_then(|()| self.output.flush())
            .is_err()
        {
            return false;
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrackSummary {
    track: TrackId,
    color: Rgb,
    label: String,
    points: usize,
    first_vertex: Option<GlobalId>,
    last_vertex: Option<GlobalId>,
    visible: bool,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct FileSummary {
    file: String,
    dirty: bool,
    tracks: Vec<TrackSummary>,
}

fn summarize(session: &EditorSession<NullSink>) -> Option<FileSummary> {
    let file = session.active_file()?;
    let tracks = session
        .legend()
        .into_iter()
        .filter_map(|row| {
            let track = file.track(row.track)?;
            Some(TrackSummary {
                track: row.track,
                color: row.color,
                label: row.label,
                points: track.len(),
                first_vertex: track.anchor(),
                last_vertex: track.last_global_id(),
                visible: row.visible,
                selected: row.selected,
            })
        })
        .collect();
    Some(FileSummary {
        file: file.name.clone(),
        dirty: file.dirty,
        tracks,
    })
}

fn write_summary(out: &mut dyn Write, summary: Option<FileSummary>, json: bool) -> Result<()> {
    let io = |e: std::io::Error| CliError::io("stdout", e);
    if json {
        let text = serde_json::to_string_pretty(&summary)?;
        writeln!(out, "{text}").map_err(io)?;
        return Ok(());
    }
    let Some(summary) = summary else {
        writeln!(out, "no active file").map_err(io)?;
        return Ok(());
    };
    let dirty = if summary.dirty { " (edited)" } else { "" };
    writeln!(out, "{}{dirty}: {} tracks", summary.file, summary.tracks.len()).map_err(io)?;
    for track in &summary.tracks {
        let range = match (track.first_vertex, track.last_vertex) {
            (Some(first), Some(last)) => format!("{first}..={last}"),
            _ => "-".to_string(),
        };
        let marks = match (track.selected, track.visible) {
            (true, _) => " [selected]",
            (false, false) => " [hidden]",
            (false, true) => "",
        };
        writeln!(
            out,
            "  {:>3}  {}  {:<20}  {:>5} points  vertices {range}{marks}",
            track.track.0, track.color, track.label, track.points
        )
        .map_err(io)?;
    }
    Ok(())
}

fn report_notices(notices: Vec<Notice>) {
    for notice in notices {
        let level = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("{level}: {}", notice.message);
    }
}

/// Resolve the configuration: file first, then command-line overrides.
pub fn load_config(cli: &Cli) -> Result<TrackfixConfig> {
    let mut config = match &cli.config {
        Some(path) => TrackfixConfig::from_toml_file(path)?,
        None => TrackfixConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.store.root = Some(root.clone());
        config.store.endpoint = None;
    }
    if let Some(endpoint) = &cli.endpoint {
        config.store.endpoint = Some(endpoint.clone());
        config.store.root = None;
    }
    config.ensure_valid()?;
    Ok(config)
}

fn open_session(config: &TrackfixConfig) -> Result<EditorSession<NullSink>> {
    let service = config.build_service()?;
    let dispatcher = if config.editor.background_requests {
        Dispatcher::threaded(Arc::clone(&service)).map_err(|e| CliError::io("trackfix-dispatch", e))?
    } else {
        Dispatcher::inline(Arc::clone(&service))
    };
    let mut session = EditorSession::new(service, dispatcher, config.session_config(), NullSink);
    session.refresh_file_list()?;
    Ok(session)
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .lock()
            .read_to_string(&mut text)
            .map_err(|e| CliError::io("stdin", e))?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))
}

fn confirmer(yes: bool) -> Box<dyn Confirmer> {
    if yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(PromptConfirmer::new(std::io::stdin().lock(), std::io::stderr()))
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out)
}

/// Run `cli`, writing command output to `out`.
pub fn execute(cli: Cli, out: &mut dyn Write) -> Result<()> {
    logging::init(cli.verbose);
    let config = load_config(&cli)?;
    let mut session = open_session(&config)?;

    let result = match cli.command {
        Commands::Files(args) => list_files(&session, args, out),
        Commands::Show(args) => {
            session.open_file(&args.file)?;
            write_summary(out, summarize(&session), args.json)
        }
        Commands::Edit(args) => edit(&mut session, args, out),
        Commands::Import(args) => import(&mut session, args, out),
    };

    session.flush(FLUSH_TIMEOUT);
    report_notices(session.take_notices());
    result
}

fn list_files(session: &EditorSession<NullSink>, args: FilesArgs, out: &mut dyn Write) -> Result<()> {
    let names: Vec<&str> = session.files().names().collect();
    let io = |e: std::io::Error| CliError::io("stdout", e);
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&names)?).map_err(io)?;
    } else {
        for name in names {
            writeln!(out, "{name}").map_err(io)?;
        }
    }
    Ok(())
}

fn edit(session: &mut EditorSession<NullSink>, args: EditArgs, out: &mut dyn Write) -> Result<()> {
    let script = parse_script(&read_script(&args.script)?)?;
    session.open_file(&args.file)?;
    let mut confirmer = confirmer(args.yes);
    let report = run_script(session, &script, confirmer.as_mut())?;

    if !args.json {
        for entry in &report.log {
            writeln!(out, "{entry}").map_err(|e| CliError::io("stdout", e))?;
        }
    }
    write_summary(out, summarize(session), args.json)?;

    if report.import_failed {
        return Err(CliError::Exit {
            code: 4,
            message: "import failed".into(),
        });
    }
    if !report.imported && session.active_file().is_some_and(|file| file.dirty) {
        tracing::warn!(
            target: "trackfix.cli",
            file = %args.file,
            "edits were not imported and are discarded"
        );
    }
    Ok(())
}

fn import(session: &mut EditorSession<NullSink>, args: ImportArgs, out: &mut dyn Write) -> Result<()> {
    session.open_file(&args.file)?;
    let mut confirmer = confirmer(args.yes);
    let io = |e: std::io::Error| CliError::io("stdout", e);
    match session.commit(confirmer.as_mut())? {
        CommitOutcome::Cancelled => {
            writeln!(out, "import cancelled").map_err(io)?;
            Ok(())
        }
        CommitOutcome::Finished(report) if report.outcome.is_imported() => {
            writeln!(out, "imported {}", args.file).map_err(io)?;
            Ok(())
        }
        CommitOutcome::Finished(_) => Err(CliError::Exit {
            code: 4,
            message: format!("import of {} failed", args.file),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn prompt() -> ConfirmPrompt {
        ConfirmPrompt::DeleteTrack {
            file: "flight".into(),
            track: TrackId(1),
        }
    }

    #[test]
    fn prompt_accepts_only_yes() {
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut output = Vec::new();
            let mut confirmer = PromptConfirmer::new(Cursor::new(answer), &mut output);
            assert_eq!(confirmer.confirm(&prompt()), expected, "{answer:?}");
            let shown = String::from_utf8(output).unwrap();
            assert!(shown.ends_with("[y/N] "));
        }
    }

    #[test]
    fn root_flag_replaces_configured_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trackfix.toml");
        std::fs::write(&path, "[store]\nendpoint = \"https://example.org/api\"\n").unwrap();
        let cli = Cli::try_parse_from([
            "trackfix",
            "--config",
            path.to_str().unwrap(),
            "--root",
            dir.path().to_str().unwrap(),
            "files",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.store.endpoint, None);
        assert_eq!(config.store.root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn missing_store_is_a_config_error() {
        let cli = Cli::try_parse_from(["trackfix", "files"]).unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(matches!(err, CliError::InvalidConfig(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn root_and_endpoint_conflict() {
        let parsed = Cli::try_parse_from(["trackfix", "--root", "/a", "--endpoint", "http://b", "files"]);
        assert!(parsed.is_err());
    }
}
