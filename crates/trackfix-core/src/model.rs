#![forbid(unsafe_code)]

//! Vertex, track and file model.
//!
//! # Invariants
//!
//! 1. A vertex's `global_id` is assigned once at load and never changes.
//! 2. A track's vertex list is contiguous in render order.
//! 3. Within a file the *anchor* of a track (the global id of its first
//!    vertex) is unique. Split keeps the original's anchor and gives the new
//!    track the cut vertex as anchor; neither collides because the cut is
//!    never a track's first vertex.
//! 4. A [`TrackFile`] outside of a single in-flight operation holds at least
//!    one track.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::color::Rgb;
use crate::error::ModelError;
use crate::geometry::Extent;
use crate::track_info::TrackInfo;

/// Stable per-file vertex handle.
pub type GlobalId = u64;

/// Track identifier, unique within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl TrackId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The id after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One positional sample of a flight track.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub global_id: GlobalId,
    pub lat: f64,
    pub lon: f64,
    /// Local sample time as recorded by the tracker (`ak_datetime`).
    pub timestamp: Option<String>,
    pub altitude_ft: Option<f64>,
    /// Track currently owning this sample.
    pub owner: TrackId,
    /// Feature properties this editor does not interpret.
    pub extra: Map<String, Value>,
}

impl Vertex {
    pub fn new(global_id: GlobalId, lat: f64, lon: f64, owner: TrackId) -> Self {
        Self {
            global_id,
            lat,
            lon,
            timestamp: None,
            altitude_ft: None,
            owner,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    #[must_use]
    pub fn with_altitude(mut self, altitude_ft: f64) -> Self {
        self.altitude_ft = Some(altitude_ft);
        self
    }

    /// Equality ignoring the owner, used to compare track content across
    /// operations that may renumber tracks.
    pub fn same_sample(&self, other: &Vertex) -> bool {
        self.global_id == other.global_id
            && self.lat == other.lat
            && self.lon == other.lon
            && self.timestamp == other.timestamp
            && self.altitude_ft == other.altitude_ft
    }
}

/// A single flight segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub vertices: Vec<Vertex>,
    pub color: Rgb,
    pub visible: bool,
    pub info: Arc<TrackInfo>,
}

impl Track {
    pub fn new(id: TrackId, vertices: Vec<Vertex>, color: Rgb, info: Arc<TrackInfo>) -> Self {
        Self {
            id,
            vertices,
            color,
            visible: true,
            info,
        }
    }

    /// Global id of the first vertex.
    pub fn anchor(&self) -> Option<GlobalId> {
        self.vertices.first().map(|v| v.global_id)
    }

    /// Global id of the last vertex.
    pub fn last_global_id(&self) -> Option<GlobalId> {
        self.vertices.last().map(|v| v.global_id)
    }

    /// Local index of a vertex by global id.
    pub fn position_of(&self, global_id: GlobalId) -> Option<usize> {
        self.vertices.iter().position(|v| v.global_id == global_id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Label used for the legend: departure time, falling back to the first
    /// sample's timestamp.
    pub fn display_timestamp(&self) -> String {
        self.info
            .departure_datetime
            .clone()
            .or_else(|| self.vertices.first().and_then(|v| v.timestamp.clone()))
            .unwrap_or_default()
    }

    /// Mutable access to this track's metadata, cloning it first if shared.
    pub fn info_mut(&mut self) -> &mut TrackInfo {
        Arc::make_mut(&mut self.info)
    }

    /// Bounding box of the samples.
    pub fn extent(&self) -> Extent {
        Extent::from_points(self.vertices.iter().map(|v| (v.lat, v.lon)))
    }

    /// Content equality ignoring id and vertex ownership.
    pub fn same_content(&self, other: &Track) -> bool {
        self.vertices.len() == other.vertices.len()
            && self
                .vertices
                .iter()
                .zip(&other.vertices)
                .all(|(a, b)| a.same_sample(b))
            && self.info == other.info
    }
}

/// A loaded track file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFile {
    pub name: String,
    /// Server-relative path of the backing resource.
    pub source_path: String,
    tracks: BTreeMap<TrackId, Track>,
    pub extent: Extent,
    pub selected: Option<TrackId>,
    pub dirty: bool,
}

impl TrackFile {
    /// Build a file from freshly loaded tracks. The first track is selected.
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<String>,
        tracks: impl IntoIterator<Item = Track>,
    ) -> Self {
        let tracks: BTreeMap<TrackId, Track> = tracks.into_iter().map(|t| (t.id, t)).collect();
        let selected = tracks.keys().next().copied();
        let mut file = Self {
            name: name.into(),
            source_path: source_path.into(),
            tracks,
            extent: Extent::EMPTY,
            selected,
            dirty: false,
        };
        file.refresh_extent();
        file
    }

    /// Next free id: `max(existing) + 1`.
    pub fn allocate_track_id(&self) -> Result<TrackId, ModelError> {
        self.tracks
            .keys()
            .next_back()
            .map(|id| id.next())
            .ok_or_else(|| ModelError::EmptyFile {
                file: self.name.clone(),
            })
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    /// Like [`track`](Self::track) but as a `Result`.
    pub fn require(&self, id: TrackId) -> Result<&Track, ModelError> {
        self.tracks.get(&id).ok_or_else(|| ModelError::TrackNotFound {
            file: self.name.clone(),
            track: id,
        })
    }

    /// Like [`track_mut`](Self::track_mut) but as a `Result`.
    pub fn require_mut(&mut self, id: TrackId) -> Result<&mut Track, ModelError> {
        let file = self.name.clone();
        self.tracks
            .get_mut(&id)
            .ok_or(ModelError::TrackNotFound { file, track: id })
    }

    /// Insert a track under its own id. Fails if the id is taken.
    pub fn insert_track(&mut self, track: Track) -> Result<(), ModelError> {
        if self.tracks.contains_key(&track.id) {
            return Err(ModelError::TrackExists {
                file: self.name.clone(),
                track: track.id,
            });
        }
        self.tracks.insert(track.id, track);
        Ok(())
    }

    /// Remove a track, clearing the selection if it pointed there.
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track, ModelError> {
        let track = self
            .tracks
            .remove(&id)
            .ok_or_else(|| ModelError::TrackNotFound {
                file: self.name.clone(),
                track: id,
            })?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(track)
    }

    /// Find the track whose first vertex has the given global id.
    pub fn track_id_by_anchor(&self, anchor: GlobalId) -> Option<TrackId> {
        self.tracks
            .values()
            .find(|t| t.anchor() == Some(anchor))
            .map(|t| t.id)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    /// Tracks in id order (the legend order).
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.values_mut()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Colors currently in use.
    pub fn colors(&self) -> Vec<Rgb> {
        self.tracks.values().map(|t| t.color).collect()
    }

    /// Recompute the bounding box over every track.
    pub fn refresh_extent(&mut self) {
        self.extent = self
            .tracks
            .values()
            .fold(Extent::EMPTY, |acc, t| acc.union(&t.extent()));
    }

    /// Select a track (or clear the selection). Unknown ids are an error.
    pub fn select(&mut self, id: Option<TrackId>) -> Result<(), ModelError> {
        if let Some(id) = id {
            self.require(id)?;
        }
        self.selected = id;
        Ok(())
    }

    /// Total number of vertex entries across tracks (boundary duplicates
    /// counted once per track).
    pub fn vertex_count(&self) -> usize {
        self.tracks.values().map(Track::len).sum()
    }
}
