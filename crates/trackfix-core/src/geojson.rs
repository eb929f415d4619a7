#![forbid(unsafe_code)]

//! GeoJSON documents read and written by the editor.
//!
//! # Input
//!
//! An editable file is a JSON object with a shared `track_info` record and
//! one point FeatureCollection per track segment:
//!
//! ```text
//! {
//!   "track_info": { "registration": "N123AB", ... },
//!   "geojsons": {
//!     "0": { "type": "FeatureCollection", "features": [ ...points... ] },
//!     "1": { ... }
//!   }
//! }
//! ```
//!
//! Segments are read in track id order and vertices receive sequential
//! global ids in that order, so every track starts out contiguous.
//!
//! # Output
//!
//! Import takes a single CRS84 FeatureCollection holding every vertex once,
//! tagged with the id of the track that owns it, plus the metadata of the
//! first track as a separate JSON object.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::color::Palette;
use crate::error::CodecError;
use crate::model::{GlobalId, Track, TrackFile, TrackId, Vertex};
use crate::track_info::TrackInfo;

/// Directory holding editable files on the persistence service.
pub const SOURCE_DIR: &str = "data";
/// Suffix shared by editable file names.
pub const SOURCE_SUFFIX: &str = "_geojsons.json";

/// Properties interpreted by the codec rather than passed through.
const TIMESTAMP_KEY: &str = "ak_datetime";
const ALTITUDE_KEY: &str = "altitude_ft";
const EDITOR_KEYS: [&str; 3] = ["mapID", "min_index", "segment_id"];

/// Display name for a server path (`data/abc_geojsons.json` → `abc`).
pub fn file_name_from_path(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.strip_suffix(SOURCE_SUFFIX).unwrap_or(base).to_string()
}

/// Server path for a display name (`abc` → `data/abc_geojsons.json`).
pub fn source_path_for(name: &str) -> String {
    format!("{SOURCE_DIR}/{name}{SOURCE_SUFFIX}")
}

#[derive(Debug, Deserialize)]
struct EditorDocument {
    #[serde(default)]
    track_info: TrackInfo,
    geojsons: BTreeMap<String, FeatureCollection>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Vec<f64>,
}

fn text_property(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Parse an editable file.
///
/// Each track gets its own copy of the file-level metadata, with
/// `departure_datetime` and `registration` taken from its first feature
/// when present, and a color drawn from `palette`.
pub fn decode_file(
    name: &str,
    source_path: &str,
    text: &str,
    palette: &mut Palette,
) -> Result<TrackFile, CodecError> {
    let document: EditorDocument = serde_json::from_str(text)?;
    if document.geojsons.is_empty() {
        return Err(CodecError::NoSegments {
            file: name.to_string(),
        });
    }

    let mut segments = Vec::with_capacity(document.geojsons.len());
    for (key, collection) in document.geojsons {
        let id = key
            .trim()
            .parse::<u32>()
            .map(TrackId)
            .map_err(|_| CodecError::BadSegmentKey {
                file: name.to_string(),
                segment: key.clone(),
            })?;
        if collection.features.is_empty() {
            return Err(CodecError::EmptySegment {
                file: name.to_string(),
                segment: key,
            });
        }
        segments.push((id, key, collection));
    }
    segments.sort_by_key(|(id, _, _)| *id);

    let mut next_global: GlobalId = 0;
    let mut tracks = Vec::with_capacity(segments.len());
    for (id, key, collection) in segments {
        let mut vertices = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            let geometry = feature
                .geometry
                .filter(|g| g.kind == "Point" && g.coordinates.len() >= 2)
                .ok_or_else(|| CodecError::BadGeometry {
                    segment: key.clone(),
                    index,
                })?;
            let mut properties = feature.properties;
            let timestamp = text_property(&properties, TIMESTAMP_KEY);
            let altitude_ft = properties.get(ALTITUDE_KEY).and_then(Value::as_f64);
            properties.remove(TIMESTAMP_KEY);
            properties.remove(ALTITUDE_KEY);
            for editor_key in EDITOR_KEYS {
                properties.remove(editor_key);
            }
            vertices.push(Vertex {
                global_id: next_global,
                lat: geometry.coordinates[1],
                lon: geometry.coordinates[0],
                timestamp,
                altitude_ft,
                owner: id,
                extra: properties,
            });
            next_global += 1;
        }

        let mut info = document.track_info.clone();
        if let Some(first) = vertices.first() {
            if let Some(departure) = text_property(&first.extra, "departure_datetime") {
                info.departure_datetime = Some(departure);
            }
            if let Some(registration) = text_property(&first.extra, "registration") {
                info.registration = registration;
            }
        }
        info.unlocked = false;
        tracks.push(Track::new(id, vertices, palette.next_color(), Arc::new(info)));
    }

    tracing::debug!(
        target: "trackfix.codec",
        file = %name,
        tracks = tracks.len(),
        vertices = next_global,
        "decoded track file"
    );
    Ok(TrackFile::new(name, source_path, tracks))
}

/// Encode every vertex once, under the track that owns it.
pub fn encode_feature_collection(file: &TrackFile) -> Value {
    let mut features = Vec::with_capacity(file.vertex_count());
    for track in file.tracks() {
        for vertex in track.vertices.iter().filter(|v| v.owner == track.id) {
            let mut properties = vertex.extra.clone();
            properties.insert("segment_id".into(), json!(track.id.raw()));
            properties.insert("point_index".into(), json!(vertex.global_id));
            if let Some(timestamp) = &vertex.timestamp {
                properties.insert(TIMESTAMP_KEY.into(), json!(timestamp));
            }
            if let Some(altitude) = vertex.altitude_ft {
                properties.insert(ALTITUDE_KEY.into(), json!(altitude));
            }
            if let Some(departure) = &track.info.departure_datetime {
                properties.insert("departure_datetime".into(), json!(departure));
            }
            features.push(json!({
                "type": "Feature",
                "id": vertex.global_id,
                "geometry": {"type": "Point", "coordinates": [vertex.lon, vertex.lat]},
                "properties": Value::Object(properties),
            }));
        }
    }
    json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
        "features": features,
    })
}

/// Metadata record handed to import: the first track's info with the
/// editor's name filled in.
pub fn encode_track_info(file: &TrackFile, track_editor: Option<&str>) -> Result<Value, CodecError> {
    let mut info = file
        .tracks()
        .next()
        .map(|t| TrackInfo::clone(&t.info))
        .unwrap_or_default();
    if let Some(editor) = track_editor {
        info.track_editor = editor.to_string();
    }
    Ok(serde_json::to_value(info)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "track_info": {"registration": "N1", "operator_code": "Op", "submitter": "a@b"},
        "geojsons": {
            "1": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-150.0, 63.3]},
                 "properties": {"ak_datetime": "2019-06-01 13:00:00", "departure_datetime": "2019-06-01 13:00:00"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-150.1, 63.4]},
                 "properties": {"ak_datetime": "2019-06-01 13:01:00"}}
            ]},
            "0": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-149.0, 63.0]},
                 "properties": {"ak_datetime": "2019-06-01 12:00:00", "altitude_ft": 2500,
                                "departure_datetime": "2019-06-01 12:00:00", "registration": "N42"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-149.1, 63.1]},
                 "properties": {"ak_datetime": "2019-06-01 12:01:00", "mapID": 0}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-149.2, 63.2]},
                 "properties": {"ak_datetime": "2019-06-01 12:02:00"}}
            ]}
        }
    }"#;

    #[test]
    fn path_helpers_round_trip() {
        assert_eq!(file_name_from_path("data/abc_geojsons.json"), "abc");
        assert_eq!(source_path_for("abc"), "data/abc_geojsons.json");
    }

    #[test]
    fn decode_assigns_sequential_global_ids_in_track_order() {
        let file = decode_file("f", "data/f_geojsons.json", SAMPLE, &mut Palette::default()).unwrap();
        let first = file.track(TrackId(0)).unwrap();
        let second = file.track(TrackId(1)).unwrap();
        let ids: Vec<_> = first.vertices.iter().map(|v| v.global_id).collect();
        assert_eq!(ids, [0, 1, 2]);
        assert_eq!(second.anchor(), Some(3));
        assert_eq!(first.vertices[0].lat, 63.0);
        assert_eq!(first.vertices[0].lon, -149.0);
        assert_eq!(first.vertices[0].altitude_ft, Some(2500.0));
        assert!(first.vertices[1].extra.get("mapID").is_none());
    }

    #[test]
    fn decode_takes_departure_and_registration_from_first_feature() {
        let file = decode_file("f", "p", SAMPLE, &mut Palette::default()).unwrap();
        let first = file.track(TrackId(0)).unwrap();
        assert_eq!(first.info.registration, "N42");
        assert_eq!(first.info.departure_datetime.as_deref(), Some("2019-06-01 12:00:00"));
        let second = file.track(TrackId(1)).unwrap();
        assert_eq!(second.info.registration, "N1");
        assert_eq!(second.info.operator_code, "Op");
    }

    #[test]
    fn decode_rejects_empty_documents() {
        let err = decode_file("f", "p", r#"{"geojsons": {}}"#, &mut Palette::default()).unwrap_err();
        assert!(matches!(err, CodecError::NoSegments { .. }));
    }

    #[test]
    fn decode_rejects_non_numeric_segment_keys() {
        let text = r#"{"geojsons": {"a": {"features": [{"geometry": {"type": "Point", "coordinates": [0, 0]}}]}}}"#;
        let err = decode_file("f", "p", text, &mut Palette::default()).unwrap_err();
        assert!(matches!(err, CodecError::BadSegmentKey { .. }));
    }

    #[test]
    fn decode_rejects_non_point_geometry() {
        let text = r#"{"geojsons": {"0": {"features": [{"geometry": {"type": "LineString", "coordinates": []}}]}}}"#;
        let err = decode_file("f", "p", text, &mut Palette::default()).unwrap_err();
        assert!(matches!(err, CodecError::BadGeometry { index: 0, .. }));
    }

    #[test]
    fn encode_emits_each_vertex_once_under_its_owner() {
        let mut file = decode_file("f", "p", SAMPLE, &mut Palette::default()).unwrap();
        // Simulate a shared boundary vertex owned by track 1.
        let boundary = {
            let second = file.track(TrackId(1)).unwrap();
            let mut v = second.vertices[0].clone();
            v.owner = TrackId(1);
            v
        };
        file.track_mut(TrackId(0)).unwrap().vertices.push(boundary);

        let collection = encode_feature_collection(&file);
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 5);
        let segment_of_3: Vec<_> = features
            .iter()
            .filter(|f| f["id"] == json!(3))
            .map(|f| f["properties"]["segment_id"].clone())
            .collect();
        assert_eq!(segment_of_3, [json!(1)]);
        assert_eq!(
            collection["crs"]["properties"]["name"],
            json!("urn:ogc:def:crs:OGC:1.3:CRS84")
        );
    }

    #[test]
    fn encode_track_info_uses_first_track_and_editor() {
        let file = decode_file("f", "p", SAMPLE, &mut Palette::default()).unwrap();
        let info = encode_track_info(&file, Some("sam")).unwrap();
        assert_eq!(info["registration"], json!("N42"));
        assert_eq!(info["track_editor"], json!("sam"));
    }
}
