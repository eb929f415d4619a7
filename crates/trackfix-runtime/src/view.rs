#![forbid(unsafe_code)]

//! Selection and view projection.
//!
//! Edits mutate the model; afterwards the session re-derives what should be
//! visible and hands it to a [`ViewSink`] as declarative [`ViewUpdate`]s.
//! Nothing here touches rendering primitives, and projecting never changes
//! the model.

use serde::Serialize;
use trackfix_core::{Extent, GlobalId, Rgb, TrackFile, TrackId};

use crate::error::Result;

/// One legend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendRow {
    pub track: TrackId,
    pub color: Rgb,
    /// Departure time, or the first sample's time.
    pub label: String,
    pub visible: bool,
    pub selected: bool,
    /// Whether the row offers a delete button.
    pub deletable: bool,
}

/// Polyline of one visible track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackLine {
    pub track: TrackId,
    pub color: Rgb,
    /// `(lat, lon)` in vertex order.
    pub points: Vec<(f64, f64)>,
    pub highlighted: bool,
}

/// A vertex of the selected track, clickable for splitting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMarker {
    pub global_id: GlobalId,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: Option<String>,
    /// Splitting here is allowed (not an endpoint).
    pub splittable: bool,
}

/// Map layers for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub lines: Vec<TrackLine>,
    pub selected: Option<TrackId>,
    pub points: Vec<PointMarker>,
    pub extent: Extent,
}

/// Declarative update for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewUpdate {
    /// File menu contents.
    Files {
        names: Vec<String>,
        active: Option<String>,
    },
    Legend {
        file: String,
        rows: Vec<LegendRow>,
    },
    Map {
        file: String,
        view: MapView,
    },
    /// No file is active.
    Cleared,
}

/// Consumer of view updates.
pub trait ViewSink {
    fn apply(&mut self, update: ViewUpdate);
}

impl<F: FnMut(ViewUpdate)> ViewSink for F {
    fn apply(&mut self, update: ViewUpdate) {
        self(update);
    }
}

/// Discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ViewSink for NullSink {
    fn apply(&mut self, _update: ViewUpdate) {}
}

/// Keeps every update, for tests and scripted runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub updates: Vec<ViewUpdate>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent legend emitted.
    pub fn last_legend(&self) -> Option<(&str, &[LegendRow])> {
        self.updates.iter().rev().find_map(|u| match u {
            ViewUpdate::Legend { file, rows } => Some((file.as_str(), rows.as_slice())),
            _ => None,
        })
    }

    /// Most recent map emitted.
    pub fn last_map(&self) -> Option<(&str, &MapView)> {
        self.updates.iter().rev().find_map(|u| match u {
            ViewUpdate::Map { file, view } => Some((file.as_str(), view)),
            _ => None,
        })
    }

    pub fn last_files(&self) -> Option<(&[String], Option<&str>)> {
        self.updates.iter().rev().find_map(|u| match u {
            ViewUpdate::Files { names, active } => Some((names.as_slice(), active.as_deref())),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }
}

impl ViewSink for RecordingSink {
    fn apply(&mut self, update: ViewUpdate) {
        self.updates.push(update);
    }
}

/// Legend rows in track id order.
pub fn project_legend(file: &TrackFile) -> Vec<LegendRow> {
    file.tracks()
        .map(|track| LegendRow {
            track: track.id,
            color: track.color,
            label: track.display_timestamp(),
            visible: track.visible,
            selected: file.selected == Some(track.id),
            deletable: true,
        })
        .collect()
}

/// Lines of the visible tracks plus the points of the selected one.
pub fn project_map(file: &TrackFile) -> MapView {
    let lines = file
        .tracks()
        .filter(|t| t.visible)
        .map(|t| TrackLine {
            track: t.id,
            color: t.color,
            points: t.vertices.iter().map(|v| (v.lat, v.lon)).collect(),
            highlighted: file.selected == Some(t.id),
        })
        .collect();

    let selected = file
        .selected
        .and_then(|id| file.track(id))
        .filter(|t| t.visible);
    let points = selected
        .map(|t| {
            let last = t.len().saturating_sub(1);
            t.vertices
                .iter()
                .enumerate()
                .map(|(i, v)| PointMarker {
                    global_id: v.global_id,
                    lat: v.lat,
                    lon: v.lon,
                    timestamp: v.timestamp.clone(),
                    splittable: i != 0 && i != last,
                })
                .collect()
        })
        .unwrap_or_default();

    MapView {
        lines,
        selected: selected.map(|t| t.id),
        points,
        extent: file.extent,
    }
}

/// Emit the legend and map of `file`.
pub fn project_file(file: &TrackFile, sink: &mut dyn ViewSink) {
    sink.apply(ViewUpdate::Legend {
        file: file.name.clone(),
        rows: project_legend(file),
    });
    sink.apply(ViewUpdate::Map {
        file: file.name.clone(),
        view: project_map(file),
    });
}

/// Select a track. A hidden track is shown again.
pub fn select(file: &mut TrackFile, track: TrackId) -> Result<()> {
    file.require_mut(track)?.visible = true;
    file.select(Some(track))?;
    Ok(())
}

pub fn deselect(file: &mut TrackFile) {
    file.selected = None;
}

/// Show or hide a track; hiding the selected track deselects it.
pub fn set_visible(file: &mut TrackFile, track: TrackId, visible: bool) -> Result<()> {
    file.require_mut(track)?.visible = visible;
    if !visible && file.selected == Some(track) {
        file.selected = None;
    }
    Ok(())
}

/// Ids of hidden tracks.
pub fn hidden_tracks(file: &TrackFile) -> Vec<TrackId> {
    file.tracks().filter(|t| !t.visible).map(|t| t.id).collect()
}
