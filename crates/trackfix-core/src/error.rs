use thiserror::Error;

use crate::model::{GlobalId, TrackId};

/// Errors raised by direct model manipulation.
///
/// These indicate a broken caller invariant rather than a user mistake;
/// user-facing validation lives one layer up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("file {file} has no tracks")]
    EmptyFile { file: String },

    #[error("track {track} not found in file {file}")]
    TrackNotFound { file: String, track: TrackId },

    #[error("track {track} already exists in file {file}")]
    TrackExists { file: String, track: TrackId },

    #[error("vertex {vertex} is not part of track {track} in file {file}")]
    VertexNotFound {
        file: String,
        track: TrackId,
        vertex: GlobalId,
    },

    #[error("file not found: {file}")]
    FileNotFound { file: String },

    #[error("file {file} is listed but not loaded")]
    FileNotLoaded { file: String },
}

/// Errors raised while decoding or encoding the editor's GeoJSON documents.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file {file} contains no track segments")]
    NoSegments { file: String },

    #[error("segment {segment} of file {file} has no features")]
    EmptySegment { file: String, segment: String },

    #[error("segment key {segment:?} in file {file} is not a track id")]
    BadSegmentKey { file: String, segment: String },

    #[error("feature {index} of segment {segment} has no point geometry")]
    BadGeometry { segment: String, index: usize },
}
