#![forbid(unsafe_code)]

//! Splitting a track at a vertex.
//!
//! The original keeps `vertices[..=i]`, the new track gets `vertices[i..]`;
//! the cut vertex appears in both. Ownership of the cut vertex and of every
//! later sample moves to the new track, so an export lists each sample once.
//! The cut timestamp becomes the original's landing time and the new track's
//! departure time.

use std::sync::Arc;

use trackfix_core::{FileRegistry, GlobalId, ModelError, Palette, Rgb, TrackFile, TrackId, TrackInfo};

use crate::error::{EditError, Result};
use crate::undo::{
    CommandError, CommandMetadata, CommandResult, CommandSource, EditCommand, Effect,
};

/// Validate a cut and return the cut's local index.
fn cut_index(file: &TrackFile, track: TrackId, cut: GlobalId) -> Result<usize> {
    let original = file.require(track)?;
    let index = original
        .position_of(cut)
        .ok_or(EditError::VertexNotFound { track, vertex: cut })?;
    if index == 0 || index + 1 >= original.len() {
        return Err(EditError::InvalidCutPoint { track, vertex: cut });
    }
    Ok(index)
}

/// Split `track` at `cut`, giving the new track `color`. Returns the new id.
///
/// Nothing is changed (and no id is allocated) when the cut is invalid.
pub(crate) fn apply_split(
    file: &mut TrackFile,
    track: TrackId,
    cut: GlobalId,
    color: Rgb,
) -> Result<TrackId> {
    let index = cut_index(file, track, cut)?;
    let new_id = file.allocate_track_id()?;

    let original = file.require_mut(track)?;
    let mut tail = original.vertices.split_off(index + 1);
    let cut_vertex = &mut original.vertices[index];
    // Only samples still owned by the split track move. Samples adopted from
    // a deleted neighbor keep their owner so each one is exported once.
    if cut_vertex.owner == track {
        cut_vertex.owner = new_id;
    }
    tail.insert(0, cut_vertex.clone());
    for vertex in &mut tail {
        if vertex.owner == track {
            vertex.owner = new_id;
        }
    }
    let cut_time = cut_vertex.timestamp.clone();

    let mut info = TrackInfo::clone(&original.info);
    info.departure_datetime = cut_time.clone();
    original.info_mut().landing_datetime = cut_time;

    let mut spawned = trackfix_core::Track::new(new_id, tail, color, Arc::new(info));
    spawned.visible = true;
    file.insert_track(spawned)?;
    file.selected = Some(new_id);
    file.dirty = true;
    file.refresh_extent();

    tracing::debug!(
        target: "trackfix.split",
        file = %file.name,
        original = %track,
        spawned = %new_id,
        cut,
        "split applied"
    );
    Ok(new_id)
}

/// Reverse a split: append the spawned track to the original, drop the
/// boundary duplicate, restore `info`, select the original.
pub fn merge_back(
    file: &mut TrackFile,
    original: TrackId,
    spawned: TrackId,
    info: Arc<TrackInfo>,
) -> std::result::Result<(), ModelError> {
    file.require(original)?;
    let removed = file.remove_track(spawned)?;

    let target = file.require_mut(original)?;
    let boundary = target.last_global_id();
    for mut vertex in removed.vertices {
        if Some(vertex.global_id) == boundary {
            continue;
        }
        if vertex.owner == spawned {
            vertex.owner = original;
        }
        target.vertices.push(vertex);
    }
    for vertex in &mut target.vertices {
        if vertex.owner == spawned {
            vertex.owner = original;
        }
    }
    target.info = info;

    file.selected = Some(original);
    file.dirty = true;
    file.refresh_extent();
    tracing::debug!(
        target: "trackfix.split",
        file = %file.name,
        %original,
        %spawned,
        "split reverted"
    );
    Ok(())
}

/// Split the track and build the history entry for it.
pub fn split_track(
    file: &mut TrackFile,
    track: TrackId,
    cut: GlobalId,
    palette: &mut Palette,
    source: CommandSource,
) -> Result<SplitCmd> {
    let _span = tracing::debug_span!("split", file = %file.name, %track, cut).entered();

    cut_index(file, track, cut)?;
    let original = file.require(track)?;
    let anchor = original.anchor().ok_or(EditError::VertexNotFound { track, vertex: cut })?;
    let pre_info = Arc::clone(&original.info);
    let color = palette.next_distinct(&file.colors());

    let spawned = apply_split(file, track, cut, color)?;
    Ok(SplitCmd {
        meta: CommandMetadata::new(format!("Split track {track} at vertex {cut}"))
            .with_source(source),
        file: file.name.clone(),
        anchor,
        cut,
        color,
        spawned,
        pre_info,
    })
}

/// History entry for a split.
#[derive(Debug)]
pub struct SplitCmd {
    meta: CommandMetadata,
    file: String,
    /// First vertex of the original track.
    anchor: GlobalId,
    /// First vertex of the spawned track.
    cut: GlobalId,
    /// Reused on redo.
    color: Rgb,
    spawned: TrackId,
    /// Original's metadata before the split.
    pre_info: Arc<TrackInfo>,
}

impl SplitCmd {
    /// Id of the track created by the most recent application.
    pub fn spawned(&self) -> TrackId {
        self.spawned
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    fn resolve(&self, file: &TrackFile, anchor: GlobalId) -> CommandResult<TrackId> {
        file.track_id_by_anchor(anchor)
            .ok_or_else(|| CommandError::AnchorNotFound {
                file: self.file.clone(),
                anchor,
            })
    }
}

impl EditCommand for SplitCmd {
    fn undo(&mut self, files: &mut FileRegistry) -> CommandResult<Effect> {
        let file = files.get_mut(&self.file)?;
        let original = self.resolve(file, self.anchor)?;
        let spawned = self.resolve(file, self.cut)?;
        merge_back(file, original, spawned, Arc::clone(&self.pre_info))?;
        Ok(Effect::None)
    }

    fn redo(&mut self, files: &mut FileRegistry) -> CommandResult<Effect> {
        let file = files.get_mut(&self.file)?;
        let original = self.resolve(file, self.anchor)?;
        self.pre_info = Arc::clone(&file.require(original)?.info);
        self.spawned = apply_split(file, original, self.cut, self.color)
            .map_err(|e| CommandError::InvalidState(e.to_string()))?;
        Ok(Effect::None)
    }

    fn file(&self) -> &str {
        &self.file
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.meta
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.meta.size_bytes() + self.file.len()
    }

    fn debug_name(&self) -> &'static str {
        "SplitCmd"
    }
}
