use std::sync::Arc;

use crate::core::color::color_distance;
use crate::core::geometry::{self, GeometryError};
use crate::core::similarity::TypeSimilarityTable;
use crate::models::Item;

/// Version tag of the feature schema below. The classifier artifact records
/// the schema it was trained against; bumping the feature set means a new
/// tag, so drift between builder and model is detectable instead of silent.
///
/// v2 uses the absolute whole-day date gap (earlier revisions disagreed on
/// the sign) and the Jaccard form of the overlap ratios.
pub const FEATURE_SCHEMA_VERSION: &str = "lf-features-v2";

/// Fixed feature order shared with the classifier.
pub const FEATURE_NAMES: [&str; 15] = [
    "type_similarity",
    "color_distance",
    "date_distance",
    "location_min_distance",
    "location_centroid_distance",
    "location_overlap_ratio",
    "path_overlap_ratio",
    "transport_lines_overlap_ratio",
    "weighted_path_overlap_ratio",
    "weighted_transport_lines_overlap_ratio",
    "lost_has_path",
    "found_has_path",
    "lost_has_transport_lines",
    "found_has_transport_lines",
    "same_transport_line",
];

/// Default buffer radius for the overlap features, in meters.
pub const DEFAULT_BUFFER_RADIUS_M: f64 = 500.0;

/// An ordered name -> value mapping for one lost/found pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn set(&mut self, name: &str, value: f64) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Project the vector onto the classifier's fixed feature order.
    ///
    /// A name the builder did not compute becomes 0 rather than an error,
    /// so a model trained against an older schema revision keeps working.
    pub fn reindex(&self, names: &[String]) -> Vec<f64> {
        names
            .iter()
            .map(|name| self.get(name).unwrap_or(0.0))
            .collect()
    }
}

/// Builds the feature vector for one lost/found pair.
///
/// Pure given the two items and the injected similarity table; every call
/// resolves and reprojects the geometries it needs on its own.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    types: Arc<TypeSimilarityTable>,
    buffer_radius: f64,
}

impl FeatureBuilder {
    pub fn new(types: Arc<TypeSimilarityTable>, buffer_radius: f64) -> Self {
        Self {
            types,
            buffer_radius,
        }
    }

    /// Compute all features for the pair. The first argument must be the
    /// lost-typed item; callers assign roles before building.
    pub fn build(&self, lost: &Item, found: &Item) -> Result<FeatureVector, GeometryError> {
        let lost_geom = geometry::normalize(&lost.location)?;
        let found_geom = geometry::normalize(&found.location)?;

        let type_similarity = self.types.score(&lost.type_name, &found.type_name);
        let color = color_distance(lost.color, found.color);
        let date_distance = (lost.date - found.date).num_days().abs() as f64;

        let min_distance = lost_geom.min_distance(&found_geom);
        let centroid = geometry::centroid_distance(&lost_geom, &found_geom);
        let overlap = geometry::buffered_overlap_ratio(&lost_geom, &found_geom, self.buffer_radius);

        // Sub-geometry views are normalized independently per side.
        let lost_path = geometry::normalize_path(&lost.location);
        let found_path = geometry::normalize_path(&found.location);
        let lost_lines = geometry::normalize_transport_lines(&lost.location);
        let found_lines = geometry::normalize_transport_lines(&found.location);

        let path_overlap = match (&lost_path, &found_path) {
            (Some(a), Some(b)) => geometry::buffered_overlap_ratio(a, b, self.buffer_radius),
            _ => 0.0,
        };
        let lines_overlap = match (&lost_lines, &found_lines) {
            (Some(a), Some(b)) => geometry::buffered_overlap_ratio(a, b, self.buffer_radius),
            _ => 0.0,
        };

        let lost_has_path = presence(&lost_path);
        let found_has_path = presence(&found_path);
        let lost_has_lines = presence(&lost_lines);
        let found_has_lines = presence(&found_lines);

        let mut features = FeatureVector::default();
        features.set("type_similarity", type_similarity);
        features.set("color_distance", color);
        features.set("date_distance", date_distance);
        features.set("location_min_distance", min_distance);
        features.set("location_centroid_distance", centroid);
        features.set("location_overlap_ratio", overlap);
        features.set("path_overlap_ratio", path_overlap);
        features.set("transport_lines_overlap_ratio", lines_overlap);
        features.set(
            "weighted_path_overlap_ratio",
            path_overlap * lost_has_path * found_has_path,
        );
        features.set(
            "weighted_transport_lines_overlap_ratio",
            lines_overlap * lost_has_lines * found_has_lines,
        );
        features.set("lost_has_path", lost_has_path);
        features.set("found_has_path", found_has_path);
        features.set("lost_has_transport_lines", lost_has_lines);
        features.set("found_has_transport_lines", found_has_lines);
        features.set(
            "same_transport_line",
            if same_transport_line(lost, found) {
                1.0
            } else {
                0.0
            },
        );
        Ok(features)
    }
}

fn presence<T>(value: &Option<T>) -> f64 {
    if value.is_some() {
        1.0
    } else {
        0.0
    }
}

/// True when any transport-line coordinate sequence is exactly equal
/// between the two items.
fn same_transport_line(lost: &Item, found: &Item) -> bool {
    let (Some(lost_lines), Some(found_lines)) = (
        &lost.location.public_transport_lines,
        &found.location.public_transport_lines,
    ) else {
        return false;
    };
    lost_lines
        .iter()
        .any(|a| found_lines.iter().any(|b| a.coordinates == b.coordinates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoShape, ItemKind, LocationSpec};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;

    fn table() -> Arc<TypeSimilarityTable> {
        let mut entries = HashMap::new();
        let mut row = HashMap::new();
        row.insert("wallet".to_string(), 1.0);
        row.insert("purse".to_string(), 0.7);
        entries.insert("wallet".to_string(), row);
        Arc::new(TypeSimilarityTable::new(entries))
    }

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(table(), DEFAULT_BUFFER_RADIUS_M)
    }

    fn point_item(kind: ItemKind, type_name: &str, lon: f64, lat: f64, day: u32) -> Item {
        Item {
            kind,
            id: format!("{}-{}", type_name, day),
            type_name: type_name.to_string(),
            subtype: None,
            color: [120, 60, 30],
            location: LocationSpec {
                path: Some(GeoShape {
                    kind: "Point".to_string(),
                    coordinates: json!([lon, lat]),
                }),
                public_transport_lines: None,
            },
            date: Utc.with_ymd_and_hms(2023, 1, day, 12, 0, 0).unwrap(),
        }
    }

    fn lines_item(kind: ItemKind, coords: serde_json::Value) -> Item {
        Item {
            kind,
            id: "lines-item".to_string(),
            type_name: "wallet".to_string(),
            subtype: None,
            color: [120, 60, 30],
            location: LocationSpec {
                path: None,
                public_transport_lines: Some(vec![GeoShape {
                    kind: "LineString".to_string(),
                    coordinates: coords,
                }]),
            },
            date: Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_schema_covers_built_vector() {
        let lost = point_item(ItemKind::Lost, "wallet", 15.0, 50.0, 1);
        let found = point_item(ItemKind::Found, "wallet", 15.0, 50.0, 2);

        let features = builder().build(&lost, &found).unwrap();
        assert_eq!(features.len(), FEATURE_NAMES.len());
        for (built, expected) in features.iter().zip(FEATURE_NAMES) {
            assert_eq!(built.0, expected);
        }
    }

    #[test]
    fn test_same_point_spatial_features() {
        let lost = point_item(ItemKind::Lost, "wallet", 15.0, 50.0, 1);
        let found = point_item(ItemKind::Found, "wallet", 15.0, 50.0, 1);

        let features = builder().build(&lost, &found).unwrap();
        assert_eq!(features.get("location_min_distance"), Some(0.0));
        assert!(features.get("location_centroid_distance").unwrap() < 1e-9);
        assert!((features.get("location_overlap_ratio").unwrap() - 1.0).abs() < 1e-3);
        assert_eq!(features.get("lost_has_path"), Some(1.0));
        assert_eq!(features.get("found_has_path"), Some(1.0));
        assert_eq!(features.get("lost_has_transport_lines"), Some(0.0));
    }

    #[test]
    fn test_date_distance_absolute_nine_days() {
        let lost = point_item(ItemKind::Lost, "wallet", 15.0, 50.0, 1);
        let found = point_item(ItemKind::Found, "wallet", 15.0, 50.0, 10);

        let forward = builder().build(&lost, &found).unwrap();
        assert_eq!(forward.get("date_distance"), Some(9.0));

        // Swapping report order must not flip the sign.
        let lost_late = point_item(ItemKind::Lost, "wallet", 15.0, 50.0, 10);
        let found_early = point_item(ItemKind::Found, "wallet", 15.0, 50.0, 1);
        let reverse = builder().build(&lost_late, &found_early).unwrap();
        assert_eq!(reverse.get("date_distance"), Some(9.0));
    }

    #[test]
    fn test_type_similarity_with_fallback() {
        let lost = point_item(ItemKind::Lost, "purse", 15.0, 50.0, 1);
        let found = point_item(ItemKind::Found, "wallet", 15.0, 50.0, 1);

        // Only wallet -> purse exists in the table; the reverse direction
        // must resolve through the fallback.
        let features = builder().build(&lost, &found).unwrap();
        assert_eq!(features.get("type_similarity"), Some(0.7));
    }

    #[test]
    fn test_unknown_type_similarity_zero() {
        let lost = point_item(ItemKind::Lost, "spaceship", 15.0, 50.0, 1);
        let found = point_item(ItemKind::Found, "teapot", 15.0, 50.0, 1);

        let features = builder().build(&lost, &found).unwrap();
        assert_eq!(features.get("type_similarity"), Some(0.0));
    }

    #[test]
    fn test_path_overlap_gated_by_presence() {
        let lost = point_item(ItemKind::Lost, "wallet", 15.0, 50.0, 1);
        let found = lines_item(ItemKind::Found, json!([[15.0, 50.0], [15.001, 50.0]]));

        let features = builder().build(&lost, &found).unwrap();
        // One side has only a path, the other only transport lines: both
        // restricted ratios collapse to 0 even though the full geometries
        // overlap heavily.
        assert_eq!(features.get("path_overlap_ratio"), Some(0.0));
        assert_eq!(features.get("transport_lines_overlap_ratio"), Some(0.0));
        assert_eq!(features.get("weighted_path_overlap_ratio"), Some(0.0));
        assert!(features.get("location_overlap_ratio").unwrap() > 0.5);
    }

    #[test]
    fn test_same_transport_line_exact_match() {
        let coords = json!([[15.0, 50.0], [15.01, 50.01], [15.02, 50.0]]);
        let lost = lines_item(ItemKind::Lost, coords.clone());
        let found = lines_item(ItemKind::Found, coords);

        let features = builder().build(&lost, &found).unwrap();
        assert_eq!(features.get("same_transport_line"), Some(1.0));
        assert!(features.get("weighted_transport_lines_overlap_ratio").unwrap() > 0.9);

        let other = lines_item(ItemKind::Found, json!([[15.0, 50.0], [15.01, 50.0]]));
        let features = builder().build(&lost, &other).unwrap();
        assert_eq!(features.get("same_transport_line"), Some(0.0));
    }

    #[test]
    fn test_build_fails_on_unresolvable_location() {
        let lost = point_item(ItemKind::Lost, "wallet", 15.0, 50.0, 1);
        let mut found = point_item(ItemKind::Found, "wallet", 15.0, 50.0, 1);
        found.location = LocationSpec::default();

        assert!(builder().build(&lost, &found).is_err());
    }

    #[test]
    fn test_reindex_fills_missing_with_zero() {
        let mut features = FeatureVector::default();
        features.set("type_similarity", 0.9);

        let schema: Vec<String> = vec![
            "type_similarity".to_string(),
            "a_feature_from_the_future".to_string(),
        ];
        assert_eq!(features.reindex(&schema), vec![0.9, 0.0]);
    }
}
