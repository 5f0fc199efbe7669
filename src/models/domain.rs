use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether an item was reported as lost or found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Lost,
    Found,
}

impl ItemKind {
    /// The candidate side an item of this kind is matched against.
    pub fn opposite(&self) -> ItemKind {
        match self {
            ItemKind::Lost => ItemKind::Found,
            ItemKind::Found => ItemKind::Lost,
        }
    }

    /// Path segment used by the item store (`/lost` or `/found`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Lost => "lost",
            ItemKind::Found => "found",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw GeoJSON-style shape. Coordinates are kept untyped here; the
/// geometry normalizer decides which kinds are supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoShape {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

/// Location payload of an item: an optional path geometry and/or a set of
/// public transport line geometries. At least one must resolve to a
/// supported shape for the item to be scorable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationSpec {
    #[serde(default)]
    pub path: Option<GeoShape>,
    #[serde(rename = "publicTransportLines", default)]
    pub public_transport_lines: Option<Vec<GeoShape>>,
}

impl LocationSpec {
    /// True when neither part is present at all.
    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self
                .public_transport_lines
                .as_ref()
                .map_or(true, |lines| lines.is_empty())
    }
}

/// An item record as stored by the backend, before the caller tags it with
/// its lost/found kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub color: [u8; 3],
    pub location: LocationSpec,
    pub date: DateTime<Utc>,
}

impl ItemRecord {
    pub fn into_item(self, kind: ItemKind) -> Item {
        Item {
            kind,
            id: self.id,
            type_name: self.type_name,
            subtype: self.subtype,
            color: self.color,
            location: self.location,
            date: self.date,
        }
    }
}

/// A lost or found item. Immutable once constructed, whether it came from
/// an inbound message or a candidate fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "item_type")]
    pub kind: ItemKind,
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub color: [u8; 3],
    pub location: LocationSpec,
    pub date: DateTime<Utc>,
}

/// A scored lost/found pair that cleared the probability threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "lostId")]
    pub lost_id: String,
    #[serde(rename = "foundId")]
    pub found_id: String,
    #[serde(rename = "matchProbability")]
    pub match_probability: f64,
}
