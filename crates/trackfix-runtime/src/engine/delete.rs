#![forbid(unsafe_code)]

//! Deleting tracks, and the file cascade when the last one goes.
//!
//! A deleted track is kept whole in its history entry (vertices, metadata,
//! color, visibility). Undo reinserts it under its old id, or under
//! `max + 1` when that id was taken in the meantime.
//!
//! A neighbor that shares a boundary vertex with the deleted track takes
//! over ownership of its copy, so the sample is still exported once; undo
//! hands it back.
//!
//! Deleting the last track of a file removes the file from the registry and
//! asks the persistence service to delete the backing resource. Undo puts
//! the file back into the registry at its old position, in memory only:
//! the backing resource stays deleted and the restored file is dirty.

use trackfix_core::{FileEntry, FileRegistry, FileState, GlobalId, ModelError, Track, TrackFile, TrackId};

use crate::error::{EditError, Result};
use crate::undo::{
    CommandError, CommandMetadata, CommandResult, CommandSource, EditCommand, Effect,
};

/// What a removal did to the registry.
struct Removal {
    snapshot: Track,
    /// `(holder anchor, vertex)` pairs whose ownership moved to the holder.
    adopted: Vec<(GlobalId, GlobalId)>,
    /// Registry slot and shell of a file removed by the cascade.
    cascade: Option<(usize, FileEntry)>,
}

fn remove_and_cascade(
    files: &mut FileRegistry,
    file_name: &str,
    track: TrackId,
) -> std::result::Result<Removal, ModelError> {
    let file = files.get_mut(file_name)?;
    let snapshot = file.remove_track(track)?;
    let mut adopted = Vec::new();
    for holder in file.tracks_mut() {
        let (id, Some(anchor)) = (holder.id, holder.anchor()) else {
            continue;
        };
        for vertex in holder.vertices.iter_mut().filter(|v| v.owner == track) {
            vertex.owner = id;
            adopted.push((anchor, vertex.global_id));
        }
    }
    file.dirty = true;
    file.refresh_extent();

    let cascade = if file.is_empty() {
        let removed = files.remove(file_name);
        tracing::info!(
            target: "trackfix.delete",
            file = %file_name,
            "last track deleted; file removed"
        );
        removed
    } else {
        None
    };
    tracing::debug!(
        target: "trackfix.delete",
        file = %file_name,
        %track,
        vertices = snapshot.len(),
        "track deleted"
    );
    Ok(Removal {
        snapshot,
        adopted,
        cascade,
    })
}

fn cascade_effect(file_name: &str, cascade: Option<&(usize, FileEntry)>, first_time: bool) -> Effect {
    match cascade {
        Some((index, entry)) => Effect::FileRemoved {
            file: file_name.to_string(),
            source_path: entry.source_path.clone(),
            index: *index,
            delete_backing: first_time,
        },
        None => Effect::None,
    }
}

/// Whether deleting `track` would empty the file.
pub fn is_last_track(file: &TrackFile, track: TrackId) -> bool {
    file.track_count() == 1 && file.track(track).is_some()
}

/// Delete a track and build its history entry.
///
/// Confirmation is the caller's job; this mutates unconditionally.
pub fn delete_track(
    files: &mut FileRegistry,
    file_name: &str,
    track: TrackId,
    source: CommandSource,
) -> Result<(DeleteCmd, Effect)> {
    let _span = tracing::debug_span!("delete", file = %file_name, %track).entered();

    let anchor = files
        .get(file_name)?
        .require(track)?
        .anchor()
        .ok_or(EditError::Model(ModelError::TrackNotFound {
            file: file_name.to_string(),
            track,
        }))?;
    let removal = remove_and_cascade(files, file_name, track)?;
    let effect = cascade_effect(file_name, removal.cascade.as_ref(), true);

    let cmd = DeleteCmd {
        meta: CommandMetadata::new(format!("Delete track {track}")).with_source(source),
        file: file_name.to_string(),
        anchor,
        snapshot: removal.snapshot,
        adopted: removal.adopted,
        cascade: removal.cascade,
    };
    Ok((cmd, effect))
}

/// Put a deleted track back, substituting `max + 1` if its id is taken.
///
/// Returns the id the track ended up with.
pub fn restore_track(file: &mut TrackFile, mut track: Track) -> std::result::Result<TrackId, ModelError> {
    let original = track.id;
    if file.track(original).is_some() {
        let substitute = file.allocate_track_id()?;
        for vertex in &mut track.vertices {
            if vertex.owner == original {
                vertex.owner = substitute;
            }
        }
        track.id = substitute;
        tracing::debug!(
            target: "trackfix.delete",
            file = %file.name,
            %original,
            %substitute,
            "restored track under substitute id"
        );
    }
    let id = track.id;
    file.insert_track(track)?;
    file.selected = Some(id);
    file.dirty = true;
    file.refresh_extent();
    Ok(id)
}

/// History entry for a track deletion.
#[derive(Debug)]
pub struct DeleteCmd {
    meta: CommandMetadata,
    file: String,
    anchor: GlobalId,
    snapshot: Track,
    adopted: Vec<(GlobalId, GlobalId)>,
    cascade: Option<(usize, FileEntry)>,
}

impl DeleteCmd {
    /// The deleted track as it was.
    pub fn snapshot(&self) -> &Track {
        &self.snapshot
    }

    /// Whether the deletion removed the whole file.
    pub fn cascaded(&self) -> bool {
        self.cascade.is_some()
    }
}

impl EditCommand for DeleteCmd {
    fn undo(&mut self, files: &mut FileRegistry) -> CommandResult<Effect> {
        // Rebuild on a copy; the registry is written once every step passed.
        let mut file = match &self.cascade {
            Some((_, entry)) => entry.file().cloned().ok_or_else(|| ModelError::FileNotLoaded {
                file: self.file.clone(),
            })?,
            None => files.get(&self.file)?.clone(),
        };
        let restored = restore_track(&mut file, self.snapshot.clone())?;
        for &(anchor, global_id) in &self.adopted {
            let holder = file
                .track_id_by_anchor(anchor)
                .ok_or_else(|| CommandError::AnchorNotFound {
                    file: self.file.clone(),
                    anchor,
                })?;
            let holder = file.require_mut(holder)?;
            if let Some(vertex) = holder.vertices.iter_mut().find(|v| v.global_id == global_id) {
                vertex.owner = restored;
            }
        }

        match self.cascade.take() {
            Some((index, mut entry)) => {
                entry.state = FileState::Loaded(file);
                files.reinsert(index, entry);
                tracing::info!(
                    target: "trackfix.delete",
                    file = %self.file,
                    "file restored in memory; backing resource stays deleted"
                );
                Ok(Effect::FileRestored {
                    file: self.file.clone(),
                })
            }
            None => {
                *files.get_mut(&self.file)? = file;
                Ok(Effect::None)
            }
        }
    }

    fn redo(&mut self, files: &mut FileRegistry) -> CommandResult<Effect> {
        let file = files.get_mut(&self.file)?;
        let track = file
            .track_id_by_anchor(self.anchor)
            .ok_or_else(|| CommandError::AnchorNotFound {
                file: self.file.clone(),
                anchor: self.anchor,
            })?;
        let removal = remove_and_cascade(files, &self.file, track)?;
        self.snapshot = removal.snapshot;
        self.adopted = removal.adopted;
        self.cascade = removal.cascade;
        Ok(cascade_effect(&self.file, self.cascade.as_ref(), false))
    }

    fn file(&self) -> &str {
        &self.file
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.meta
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.meta.size_bytes()
            + self.file.len()
            + self.snapshot.vertices.len() * std::mem::size_of::<trackfix_core::Vertex>()
    }

    fn debug_name(&self) -> &'static str {
        "DeleteCmd"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use trackfix_core::{Rgb, TrackInfo, Vertex};

    fn track(id: u32, ids: std::ops::Range<u64>) -> Track {
        let vertices = ids
            .map(|g| Vertex::new(g, 60.0 + g as f64, -150.0, TrackId(id)))
            .collect();
        Track::new(TrackId(id), vertices, Rgb::new(id as u8, 0, 0), Arc::new(TrackInfo::default()))
    }

    fn registry(files: &[(&str, Vec<Track>)]) -> FileRegistry {
        let mut reg = FileRegistry::new();
        for (name, tracks) in files {
            reg.insert_loaded(TrackFile::new(*name, format!("data/{name}_geojsons.json"), tracks.clone()));
        }
        reg
    }

    #[test]
    fn delete_then_undo_restores_snapshot() {
        let mut reg = registry(&[("a", vec![track(0, 0..3), track(1, 3..6)])]);
        let before = reg.get("a").unwrap().track(TrackId(1)).unwrap().clone();
        let (mut cmd, effect) = delete_track(&mut reg, "a", TrackId(1), CommandSource::User).unwrap();
        assert_eq!(effect, Effect::None);
        assert!(reg.get("a").unwrap().track(TrackId(1)).is_none());

        cmd.undo(&mut reg).unwrap();
        assert_eq!(reg.get("a").unwrap().track(TrackId(1)).unwrap(), &before);
    }

    #[test]
    fn delete_clears_matching_selection() {
        let mut reg = registry(&[("a", vec![track(0, 0..3), track(1, 3..6)])]);
        reg.get_mut("a").unwrap().select(Some(TrackId(1))).unwrap();
        delete_track(&mut reg, "a", TrackId(1), CommandSource::User).unwrap();
        let file = reg.get("a").unwrap();
        assert_eq!(file.selected, None);
        assert!(file.dirty);
    }

    #[test]
    fn neighbor_adopts_shared_boundary_until_undo() {
        let mut first = track(0, 0..5);
        first.vertices[4].owner = TrackId(1);
        let mut reg = registry(&[("a", vec![first, track(1, 4..8)])]);
        let (mut cmd, _) = delete_track(&mut reg, "a", TrackId(1), CommandSource::User).unwrap();
        let file = reg.get("a").unwrap();
        assert_eq!(file.track(TrackId(0)).unwrap().vertices[4].owner, TrackId(0));

        cmd.undo(&mut reg).unwrap();
        let file = reg.get("a").unwrap();
        assert_eq!(file.track(TrackId(0)).unwrap().vertices[4].owner, TrackId(1));
        assert!(file.track(TrackId(1)).unwrap().vertices.iter().all(|v| v.owner == TrackId(1)));
    }

    #[test]
    fn failed_undo_leaves_registry_untouched() {
        let mut first = track(0, 0..5);
        first.vertices[4].owner = TrackId(1);
        let mut reg = registry(&[("a", vec![first, track(1, 4..8)])]);
        let (mut cmd, _) = delete_track(&mut reg, "a", TrackId(1), CommandSource::User).unwrap();
        // The adopting neighbor disappears behind the history's back.
        reg.get_mut("a").unwrap().remove_track(TrackId(0)).unwrap();
        let before = reg.clone();

        let err = cmd.undo(&mut reg).unwrap_err();
        assert!(matches!(err, CommandError::AnchorNotFound { anchor: 0, .. }));
        assert_eq!(reg, before);
        assert!(reg.get("a").unwrap().track(TrackId(1)).is_none());
    }

    #[test]
    fn undo_substitutes_taken_id() {
        let mut file = TrackFile::new("a", "p", [track(0, 0..3), track(3, 6..9)]);
        let restored = restore_track(&mut file, track(3, 3..6)).unwrap();
        assert_eq!(restored, TrackId(4));
        let placed = file.track(TrackId(4)).unwrap();
        assert!(placed.vertices.iter().all(|v| v.owner == TrackId(4)));
        assert_eq!(file.track(TrackId(3)).unwrap().anchor(), Some(6));
    }

    #[test]
    fn last_track_cascades_and_undo_restores_in_memory() {
        let mut reg = registry(&[("a", vec![track(0, 0..3)]), ("b", vec![track(0, 0..2)])]);
        assert!(is_last_track(reg.get("a").unwrap(), TrackId(0)));
        let (mut cmd, effect) = delete_track(&mut reg, "a", TrackId(0), CommandSource::User).unwrap();
        assert_eq!(
            effect,
            Effect::FileRemoved {
                file: "a".into(),
                source_path: "data/a_geojsons.json".into(),
                index: 0,
                delete_backing: true,
            }
        );
        assert!(!reg.contains("a"));
        assert!(cmd.cascaded());

        let effect = cmd.undo(&mut reg).unwrap();
        assert_eq!(effect, Effect::FileRestored { file: "a".into() });
        assert_eq!(reg.names().collect::<Vec<_>>(), ["a", "b"]);
        let file = reg.get("a").unwrap();
        assert!(file.dirty);
        assert_eq!(file.track_count(), 1);

        let effect = cmd.redo(&mut reg).unwrap();
        assert!(matches!(effect, Effect::FileRemoved { delete_backing: false, .. }));
        assert!(!reg.contains("a"));
    }
}
