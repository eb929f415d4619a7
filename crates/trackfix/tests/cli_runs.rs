//! Drives the command-line entry point against a temporary store.

use std::fs;
use std::path::Path;

use clap::Parser;
use serde_json::{Value, json};
use trackfix::cli::{Cli, execute};

fn write_file(root: &Path, name: &str, len: u64) {
    let features: Vec<_> = (0..len)
        .map(|i| {
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-150.0 + i as f64 * 0.02, 63.7]},
                "properties": {"ak_datetime": format!("2021-06-12 14:{i:02}:00")}
            })
        })
        .collect();
    let document = json!({
        "track_info": {
            "registration": "N4410K",
            "operator_code": "TTA",
            "aircraft_type": "C185",
        },
        "geojsons": {"0": {"type": "FeatureCollection", "features": features}},
    });
    let data = root.join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join(format!("{name}_geojsons.json")), document.to_string()).unwrap();
}

fn run(args: &[&str]) -> (trackfix::Result<()>, String) {
    let mut argv = vec!["trackfix"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    let result = execute(cli, &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn files_lists_names_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "bravo", 4);
    write_file(dir.path(), "alpha", 4);
    let root = dir.path().to_str().unwrap();

    let (result, out) = run(&["--root", root, "files"]);
    result.unwrap();
    assert_eq!(out, "alpha\nbravo\n");

    let (result, out) = run(&["--root", root, "files", "--json"]);
    result.unwrap();
    let names: Vec<String> = serde_json::from_str(&out).unwrap();
    assert_eq!(names, ["alpha", "bravo"]);
}

#[test]
fn show_describes_each_track() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "flight", 12);
    let root = dir.path().to_str().unwrap();

    let (result, out) = run(&["--root", root, "show", "flight", "--json"]);
    result.unwrap();
    let summary: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(summary["file"], "flight");
    assert_eq!(summary["dirty"], false);
    assert_eq!(summary["tracks"][0]["points"], 12);
    assert_eq!(summary["tracks"][0]["first_vertex"], 0);
    assert_eq!(summary["tracks"][0]["last_vertex"], 11);
}

#[test]
fn edit_script_applies_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "flight", 10);
    let script = dir.path().join("fixes.txt");
    fs::write(&script, "# trim the tail\nsplit 0 4\nsplit 1 7\ndelete 2\nundo\ndelete 2\n").unwrap();
    let root = dir.path().to_str().unwrap();

    let (result, out) = run(&[
        "--root",
        root,
        "edit",
        "flight",
        "--script",
        script.to_str().unwrap(),
        "--yes",
        "--json",
    ]);
    result.unwrap();
    let summary: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(summary["dirty"], true);
    let tracks = summary["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0]["last_vertex"], 4);
    assert_eq!(tracks[1]["first_vertex"], 4);
    assert_eq!(tracks[1]["last_vertex"], 7);

    // Edits stay in memory until imported.
    let (_, out) = run(&["--root", root, "show", "flight", "--json"]);
    let summary: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(summary["tracks"].as_array().unwrap().len(), 1);
}

#[test]
fn bad_script_line_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "flight", 6);
    let script = dir.path().join("fixes.txt");
    fs::write(&script, "split 0 2\nsplit 0 5\n").unwrap();
    let root = dir.path().to_str().unwrap();

    let (result, _) = run(&["--root", root, "edit", "flight", "-s", script.to_str().unwrap(), "-y"]);
    let err = result.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().starts_with("line 2:"), "{err}");
}

#[test]
fn missing_file_is_a_store_failure() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let (result, _) = run(&["--root", root, "show", "nowhere"]);
    assert_eq!(result.unwrap_err().exit_code(), 3);
}

#[cfg(unix)]
fn config_with(dir: &Path, program: &str) -> String {
    let path = dir.join("trackfix.toml");
    let text = format!(
        "[store]\nroot = {root:?}\nimport_program = {program:?}\n\n[editor]\ntrack_editor = \"reviewer\"\n",
        root = dir.to_str().unwrap(),
    );
    fs::write(&path, text).unwrap();
    path.to_str().unwrap().to_string()
}

#[cfg(unix)]
#[test]
fn import_removes_the_reviewed_file() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "flight", 6);
    let config = config_with(dir.path(), "true");

    let (result, out) = run(&["--config", &config, "import", "flight", "--yes"]);
    result.unwrap();
    assert_eq!(out, "imported flight\n");
    assert!(!dir.path().join("data/flight_geojsons.json").exists());
}

#[cfg(unix)]
#[test]
fn failed_import_exits_with_four() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "flight", 6);
    let config = config_with(dir.path(), "false");

    let (result, _) = run(&["--config", &config, "import", "flight", "--yes"]);
    assert_eq!(result.unwrap_err().exit_code(), 4);
    assert!(dir.path().join("data/flight_geojsons.json").exists());
}
