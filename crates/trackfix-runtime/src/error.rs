use thiserror::Error;
use trackfix_core::{CodecError, GlobalId, InfoIssue, ModelError, TrackId};
use trackfix_store::StoreError;

use crate::undo::CommandError;

pub type Result<T> = std::result::Result<T, EditError>;

/// Errors surfaced to the operator by editing operations.
///
/// Validation variants leave the model untouched and record nothing in the
/// history.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("cannot split track {track} at vertex {vertex}: it is the first or last vertex")]
    InvalidCutPoint { track: TrackId, vertex: GlobalId },

    #[error("vertex {vertex} is not part of track {track}")]
    VertexNotFound { track: TrackId, vertex: GlobalId },

    #[error(
        "No track is currently selected. Click a track first, then delete it or use the delete button in the legend"
    )]
    NoSelection,

    #[error("no file is open")]
    NoActiveFile,

    #[error("track info is locked; unlock it before editing")]
    InfoLocked,

    #[error("{}", .0.first().map(ToString::to_string).unwrap_or_default())]
    InvalidInfo(Vec<InfoIssue>),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl EditError {
    /// Whether the operator caused this and can fix it by acting differently.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCutPoint { .. }
                | Self::VertexNotFound { .. }
                | Self::NoSelection
                | Self::NoActiveFile
                | Self::InfoLocked
                | Self::InvalidInfo(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackfix_core::InfoField;

    #[test]
    fn invalid_info_shows_first_issue() {
        let err = EditError::InvalidInfo(vec![
            InfoIssue::Missing(InfoField::AircraftType),
            InfoIssue::MissingMissionCode,
        ]);
        assert!(err.to_string().contains("Aircraft type"));
        assert!(err.is_user_error());
    }

    #[test]
    fn model_errors_are_not_user_errors() {
        let err: EditError = ModelError::FileNotFound { file: "x".into() }.into();
        assert!(!err.is_user_error());
    }
}
