use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Query parameter names understood by the gateway and forwarded to the
/// upstream place-search API. Canonical definitions live here so the
/// request router, the search recorder, and the query allow-lists agree.
pub mod params {
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const NEW_USERNAME: &str = "newusername";
    pub const NEW_PASSWORD: &str = "newpassword";

    pub const QUERY: &str = "query";
    pub const LOCATION: &str = "location";
    pub const RADIUS: &str = "radius";
    pub const KEYWORD: &str = "keyword";
    pub const LANGUAGE: &str = "language";
    pub const MINPRICE: &str = "minprice";
    pub const MAXPRICE: &str = "maxprice";
    pub const NAME: &str = "name";
    pub const OPENNOW: &str = "opennow";
    pub const RANKBY: &str = "rankby";
    pub const TYPES: &str = "types";
    pub const PAGETOKEN: &str = "pagetoken";
    pub const ZAGATSELECTED: &str = "zagatselected";
}

/// The three place-search flavors the gateway fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Nearby,
    Text,
    Radar,
}

impl SearchKind {
    /// Label persisted in the `searchtype` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearby => "nearby",
            Self::Text => "text",
            Self::Radar => "radar",
        }
    }

    /// Upstream API path the client query string is appended to.
    pub fn api_path(self) -> &'static str {
        match self {
            Self::Nearby => "/maps/api/place/nearbysearch/json?",
            Self::Text => "/maps/api/place/textsearch/json?",
            Self::Radar => "/maps/api/place/radarsearch/json?",
        }
    }
}

/// Per-connection correlation handle. Minted once at accept time and never
/// reused; ties a search to its result rows in storage.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Timestamp as persisted: RFC 3339, so lexicographic order matches
    /// chronological order in `ORDER BY timestamp` queries.
    pub fn timestamp(&self) -> String {
        self.created_at.to_rfc3339()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// One row of the `searches` table. All search parameters are carried as
/// the client sent them; absent parameters persist as NULL.
#[derive(Debug, Clone)]
pub struct SearchRecord {
    pub session_id: Uuid,
    pub timestamp: String,
    pub kind: SearchKind,
    pub username: Option<String>,
    pub query: Option<String>,
    pub location: Option<String>,
    pub radius: Option<String>,
    pub keyword: Option<String>,
    pub language: Option<String>,
    pub minprice: Option<String>,
    pub maxprice: Option<String>,
    pub name: Option<String>,
    pub opennow: Option<String>,
    pub rankby: Option<String>,
    pub types: Option<String>,
    pub pagetoken: Option<String>,
    pub zagatselected: Option<String>,
}
