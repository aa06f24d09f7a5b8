use serde::{Deserialize, Serialize};

// -- Gateway status taxonomy --

/// Upstream success sentinel, reused by the gateway for its own responses.
pub const STATUS_OK: &str = "OK";
pub const STATUS_INVALID_REQUEST: &str = "GATEWAY_INVALID_REQUEST";
pub const STATUS_INVALID_URL: &str = "GATEWAY_INVALID_URL";
pub const STATUS_AUTHENTICATION_FAILED: &str = "GATEWAY_AUTHENTICATION_FAILED";
pub const STATUS_SEARCH_ERROR: &str = "GATEWAY_SEARCH_ERROR";
pub const STATUS_QUERY_ERROR: &str = "GATEWAY_QUERY_ERROR";
pub const STATUS_ADD_USER_ERROR: &str = "GATEWAY_ADD_USER_ERROR";

// -- Gateway response envelope --

/// JSON body of every gateway-origin response. Successful searches stream
/// the upstream response through instead of building one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub results: Vec<serde_json::Value>,
}

impl GatewayResponse {
    pub fn ok(results: Vec<serde_json::Value>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            error_message: None,
            results,
        }
    }

    pub fn empty(status: &str) -> Self {
        Self {
            status: status.to_string(),
            error_message: None,
            results: Vec::new(),
        }
    }

    pub fn error(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            error_message: Some(message.to_string()),
            results: Vec::new(),
        }
    }
}

// -- Upstream response shapes --

/// Parsed body of an upstream place-search response. Only the fields the
/// gateway inspects are modeled; everything else streams through untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<PlaceResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceResult {
    pub place_id: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}
