//! JSON bodies served by the HTTP front end.

use assistant_core::config::SERVICE_NAME;
use serde::{Deserialize, Serialize};

/// Human-readable service title.
pub const SERVICE_TITLE: &str = "AI Video Games Assistant";

/// Public API version reported at `/`.
pub const API_VERSION: &str = "1.0.0";

/// Liveness probe body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
}

impl HealthStatus {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

/// Root descriptor body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub docs: String,
    pub health: String,
}

impl ServiceInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            service: SERVICE_TITLE.to_string(),
            version: API_VERSION.to_string(),
            docs: "/docs".to_string(),
            health: "/health".to_string(),
        }
    }
}

/// Error body returned when the runtime cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
