//! Property tests for the GeoJSON codec: ids assigned at load are sequential
//! in numeric segment order, and export holds every vertex exactly once.

use proptest::prelude::*;
use serde_json::{Value, json};
use trackfix_core::geojson::{decode_file, encode_feature_collection};
use trackfix_core::{Palette, TrackId};

/// Segment keys are spaced out so that numeric and lexicographic order
/// disagree ("10" sorts before "5" as text).
fn document(lengths: &[usize]) -> String {
    let mut geojsons = serde_json::Map::new();
    for (index, &len) in lengths.iter().enumerate() {
        let features: Vec<Value> = (0..len)
            .map(|i| {
                json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [-149.0 + i as f64 * 0.01, 61.2]},
                    "properties": {"ak_datetime": format!("2022-08-01 07:{:02}:00", i % 60)}
                })
            })
            .collect();
        geojsons.insert(
            (index * 5).to_string(),
            json!({"type": "FeatureCollection", "features": features}),
        );
    }
    json!({
        "track_info": {"registration": "N321PA", "operator_code": "ERA", "aircraft_type": "B190"},
        "geojsons": geojsons,
    })
    .to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn decode_assigns_contiguous_ids_in_segment_order(
        lengths in prop::collection::vec(1usize..25, 1..6),
    ) {
        let text = document(&lengths);
        let file = decode_file("flight", "data/flight_geojsons.json", &text, &mut Palette::new(3)).unwrap();

        prop_assert_eq!(file.track_count(), lengths.len());
        let mut next = 0u64;
        for (index, track) in file.tracks().enumerate() {
            prop_assert_eq!(track.id, TrackId((index * 5) as u32));
            prop_assert_eq!(track.len(), lengths[index]);
            for vertex in &track.vertices {
                prop_assert_eq!(vertex.global_id, next);
                prop_assert_eq!(vertex.owner, track.id);
                next += 1;
            }
        }
        prop_assert_eq!(file.vertex_count() as u64, next);
    }

    #[test]
    fn export_holds_each_vertex_once(
        lengths in prop::collection::vec(1usize..25, 1..6),
    ) {
        let text = document(&lengths);
        let file = decode_file("flight", "data/flight_geojsons.json", &text, &mut Palette::new(9)).unwrap();
        let exported = encode_feature_collection(&file);
        let features = exported["features"].as_array().unwrap();

        let total: usize = lengths.iter().sum();
        prop_assert_eq!(features.len(), total);
        for (expected, feature) in features.iter().enumerate() {
            prop_assert_eq!(feature["properties"]["point_index"].as_u64(), Some(expected as u64));
            prop_assert!(feature["properties"]["segment_id"].is_u64());
        }
    }
}
