//! reFind matcher - probabilistic lost & found pair scoring
//!
//! This library scores lost/found item pairs with engineered similarity
//! features (type, color, date and spatial) and a trained classifier,
//! emitting the pairs whose match probability clears a threshold.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    Classifier, FeatureBuilder, FeatureVector, LinearModel, Matcher, TypeSimilarityTable,
    FEATURE_NAMES, FEATURE_SCHEMA_VERSION,
};
pub use crate::models::{Item, ItemKind, LocationSpec, MatchResult};
pub use crate::services::{BackendClient, MatcherService};
