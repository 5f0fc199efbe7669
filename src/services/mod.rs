// Service exports
pub mod backend;
pub mod consumer;

pub use backend::{BackendClient, BackendError};
pub use consumer::{MatcherService, PipelineError};
