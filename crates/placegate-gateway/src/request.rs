use std::collections::HashMap;

const METHOD_GET: &str = "GET";
const PROTOCOL_HTTP_1_0: &str = "HTTP/1.0";
const PROTOCOL_HTTP_1_1: &str = "HTTP/1.1";

/// A parsed client request: URL path plus query parameters, extracted from
/// the first request line. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    path: String,
    query: String,
    params: HashMap<String, String>,
}

/// Classification for lines that fail request-line validation. No further
/// processing happens for these.
#[derive(Debug, thiserror::Error)]
#[error("invalid HTTP request line")]
pub struct InvalidRequest;

impl Request {
    /// Parse a raw request line. Valid only when the line has exactly three
    /// space-separated tokens, the method is GET, and the protocol token is
    /// HTTP/1.0 or HTTP/1.1.
    pub fn parse(line: &str) -> Result<Self, InvalidRequest> {
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() != 3
            || tokens[0] != METHOD_GET
            || (tokens[2] != PROTOCOL_HTTP_1_0 && tokens[2] != PROTOCOL_HTTP_1_1)
        {
            return Err(InvalidRequest);
        }

        let (path, query) = match tokens[1].split_once('?') {
            Some((path, query)) => (path, query),
            None => (tokens[1], ""),
        };

        Ok(Self {
            path: path.to_string(),
            query: query.to_string(),
            params: parse_query(query),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, exactly as the client sent it. This is what
    /// gets forwarded to the upstream API.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// Split a query string on `&` then `=`. Pairs that do not split into
/// exactly two parts are silently dropped; later duplicate keys overwrite
/// earlier ones. Values are not URL-decoded.
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for item in query.split('&') {
        let parts: Vec<&str> = item.split('=').collect();
        if parts.len() == 2 {
            params.insert(parts[0].to_string(), parts[1].to_string());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_get_line() {
        let request =
            Request::parse("GET /nearbysearch?location=1,2&radius=500 HTTP/1.1").unwrap();
        assert_eq!(request.path(), "/nearbysearch");
        assert_eq!(request.query(), "location=1,2&radius=500");
        assert_eq!(request.param("location"), Some("1,2"));
        assert_eq!(request.param("radius"), Some("500"));
        assert_eq!(request.param("missing"), None);
    }

    #[test]
    fn accepts_both_supported_protocol_tokens() {
        assert!(Request::parse("GET / HTTP/1.0").is_ok());
        assert!(Request::parse("GET / HTTP/1.1").is_ok());
        assert!(Request::parse("GET / HTTP/2").is_err());
        assert!(Request::parse("GET / http/1.1").is_err());
    }

    #[test]
    fn rejects_wrong_token_counts() {
        assert!(Request::parse("").is_err());
        assert!(Request::parse("GET /path").is_err());
        assert!(Request::parse("GET  /path HTTP/1.1").is_err());
        assert!(Request::parse("GET /path HTTP/1.1 extra").is_err());
    }

    #[test]
    fn rejects_non_get_methods() {
        assert!(Request::parse("POST /adduser HTTP/1.1").is_err());
        assert!(Request::parse("get / HTTP/1.1").is_err());
    }

    #[test]
    fn parsing_is_idempotent() {
        let line = "GET /textsearch?query=restaurants+in+Sydney HTTP/1.0";
        assert_eq!(Request::parse(line).unwrap(), Request::parse(line).unwrap());
    }

    #[test]
    fn path_without_query_yields_empty_parameters() {
        let request = Request::parse("GET /resultquery HTTP/1.1").unwrap();
        assert_eq!(request.query(), "");
        assert!(request.params().is_empty());
    }

    #[test]
    fn later_duplicate_keys_overwrite_earlier_ones() {
        let request = Request::parse("GET /x?a=1&a=2 HTTP/1.1").unwrap();
        assert_eq!(request.param("a"), Some("2"));
    }

    // Known lossy edge case: pairs that do not split into exactly two
    // parts are dropped rather than rejected.
    #[test]
    fn malformed_pairs_are_silently_dropped() {
        let request = Request::parse("GET /x?noequals&a=b=c&ok=1 HTTP/1.1").unwrap();
        assert_eq!(request.params().len(), 2);
        assert_eq!(request.param("ok"), Some("1"));
        assert_eq!(request.param("noequals"), None);
        assert_eq!(request.param("a"), None);
        // a trailing `=` still splits in two, so the empty value is kept
        assert_eq!(
            Request::parse("GET /x?a= HTTP/1.1").unwrap().param("a"),
            Some("")
        );
    }

    #[test]
    fn values_are_not_url_decoded() {
        let request = Request::parse("GET /x?name=caf%C3%A9&q=a+b HTTP/1.1").unwrap();
        assert_eq!(request.param("name"), Some("caf%C3%A9"));
        assert_eq!(request.param("q"), Some("a+b"));
    }
}
