#![forbid(unsafe_code)]

//! Core model for the trackfix flight track editor.
//!
//! A loaded file holds one or more [`Track`]s, each an ordered run of
//! [`Vertex`] samples. Files live in a [`FileRegistry`] that preserves the
//! order of the file menu. The [`geojson`] module reads the editor's on-disk
//! format and writes the FeatureCollection handed to the import step.
//!
//! Nothing in this crate renders or persists anything; higher layers own
//! history, view projection and the persistence boundary.

pub mod color;
pub mod error;
pub mod geojson;
pub mod geometry;
pub mod model;
pub mod registry;
pub mod track_info;

pub use color::{Palette, Rgb};
pub use error::{CodecError, ModelError};
pub use geometry::Extent;
pub use model::{GlobalId, Track, TrackFile, TrackId, Vertex};
pub use registry::{FileEntry, FileRegistry, FileState};
pub use track_info::{InfoField, InfoIssue, NPS_OPERATOR, TrackInfo};
