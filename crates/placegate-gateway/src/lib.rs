pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod pool;
pub mod request;
pub mod upstream;

pub use dispatcher::{Gateway, GatewayHandle};

/// Immutable gateway configuration, injected at construction. Nothing in
/// here changes after `Gateway::start`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen port; 0 binds an ephemeral port (tests).
    pub port: u16,
    /// Hostname of the upstream place-search API.
    pub upstream_host: String,
    pub upstream_port: u16,
    /// Whether requests without a username are accepted.
    pub allow_anonymous: bool,
    /// Worker pool size; bounds concurrent in-flight requests.
    pub workers: usize,
    /// Row limit applied to the query endpoints.
    pub query_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            upstream_host: "maps.googleapis.com".to_string(),
            upstream_port: 443,
            allow_anonymous: true,
            workers: 10,
            query_limit: 20,
        }
    }
}
