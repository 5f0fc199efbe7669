// Core algorithm exports
pub mod classifier;
pub mod color;
pub mod features;
pub mod geometry;
pub mod matcher;
pub mod similarity;

pub use classifier::{Classifier, LinearModel, ModelError};
pub use color::color_distance;
pub use features::{
    FeatureBuilder, FeatureVector, DEFAULT_BUFFER_RADIUS_M, FEATURE_NAMES, FEATURE_SCHEMA_VERSION,
};
pub use geometry::{
    buffered_overlap_ratio, centroid_distance, normalize, GeometryError, NormalizedGeometry,
};
pub use matcher::{Matcher, DEFAULT_PROBABILITY_THRESHOLD};
pub use similarity::{build_table, EmbeddingLookup, TableError, TypeSimilarityTable, WordEmbeddings};
