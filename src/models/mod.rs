// Model exports
pub mod domain;
pub mod messages;
pub mod responses;

pub use domain::{GeoShape, Item, ItemKind, ItemRecord, LocationSpec, MatchResult};
pub use messages::{parse_item_message, MessageError};
pub use responses::{AckEnvelope, ApiEnvelope};
