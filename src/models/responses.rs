use serde::{Deserialize, Serialize};

/// Standard envelope returned by the reFind backend for data endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Envelope returned by write endpoints (no payload, just the flag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckEnvelope {
    pub success: bool,
}
