use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use placegate_types::api::PlaceResponse;
use placegate_types::models::SearchKind;

/// Seam between the connection handler and the remote search API.
///
/// Implementations forward a search upstream, stream the raw response
/// (header block and body, line by line) to `client`, and return the
/// parsed body so the caller can decide whether to persist. Tests plug in
/// a canned implementation here.
pub trait Upstream: Send + Sync {
    fn search(
        &self,
        kind: SearchKind,
        raw_query: &str,
        client: &mut dyn Write,
    ) -> Result<PlaceResponse>;
}

/// Production upstream: one fresh TLS connection per search, torn down when
/// the call returns. No pooling, no retries, no deadline — a slow upstream
/// occupies the calling worker for the duration.
pub struct TlsUpstream {
    host: String,
    port: u16,
    tls: Arc<ClientConfig>,
}

impl TlsUpstream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self {
            host: host.into(),
            port,
            tls: Arc::new(tls),
        }
    }
}

impl Upstream for TlsUpstream {
    fn search(
        &self,
        kind: SearchKind,
        raw_query: &str,
        client: &mut dyn Write,
    ) -> Result<PlaceResponse> {
        let server_name =
            ServerName::try_from(self.host.clone()).context("invalid upstream hostname")?;
        let conn = ClientConnection::new(self.tls.clone(), server_name)?;
        let sock = TcpStream::connect((self.host.as_str(), self.port))
            .with_context(|| format!("connecting to {}:{}", self.host, self.port))?;
        let mut stream = StreamOwned::new(conn, sock);

        // Single request line plus blank line; HTTP/1.0, no keep-alive
        write!(stream, "GET {}{} HTTP/1.0\r\n\r\n", kind.api_path(), raw_query)?;
        stream.flush()?;

        // Socket closes on drop, success or failure
        forward_response(BufReader::new(stream), client)
    }
}

/// Forward the response header block verbatim up to the first blank line,
/// then forward the body while accumulating it, and parse the accumulated
/// body as JSON.
pub fn forward_response<R: BufRead>(mut upstream: R, client: &mut dyn Write) -> Result<PlaceResponse> {
    // Headers are forwarded untouched, never inspected
    while let Some(line) = read_line(&mut upstream)? {
        forward_line(client, &line)?;
        if line.is_empty() {
            break;
        }
    }

    let mut body = String::new();
    while let Some(line) = read_line(&mut upstream)? {
        forward_line(client, &line)?;
        body.push_str(&line);
    }

    serde_json::from_str(&body).context("upstream response body is not valid JSON")
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => Ok(None),
        Ok(_) => {
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            Ok(Some(line))
        }
        // Peers that close without a TLS close_notify surface as
        // UnexpectedEof; treat it as end-of-stream like a plain EOF
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("reading upstream response"),
    }
}

fn forward_line(client: &mut dyn Write, line: &str) -> Result<()> {
    client.write_all(line.as_bytes())?;
    client.write_all(b"\r\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BODY: &str = r#"{"status":"OK","results":[{"place_id":"p1","geometry":{"location":{"lat":1.0,"lng":2.0}}}]}"#;

    #[test]
    fn forwards_headers_and_body_and_parses_status() {
        let raw = format!(
            "HTTP/1.0 200 OK\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{BODY}\r\n"
        );
        let mut forwarded = Vec::new();

        let parsed = forward_response(Cursor::new(raw.clone()), &mut forwarded).unwrap();
        assert_eq!(parsed.status, "OK");
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].place_id, "p1");
        assert_eq!(parsed.results[0].geometry.location.lat, 1.0);

        // Every line reached the client, headers included
        assert_eq!(String::from_utf8(forwarded).unwrap(), raw);
    }

    #[test]
    fn multi_line_body_is_accumulated_for_parsing() {
        let raw = "HTTP/1.0 200 OK\r\n\r\n{\r\n\"status\": \"ZERO_RESULTS\",\r\n\"results\": []\r\n}\r\n";
        let mut forwarded = Vec::new();

        let parsed = forward_response(Cursor::new(raw), &mut forwarded).unwrap();
        assert_eq!(parsed.status, "ZERO_RESULTS");
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn non_json_body_is_an_error_after_forwarding() {
        let raw = "HTTP/1.0 502 Bad Gateway\r\n\r\nupstream exploded\r\n";
        let mut forwarded = Vec::new();

        assert!(forward_response(Cursor::new(raw), &mut forwarded).is_err());
        // The raw lines were still streamed through before the parse failed
        let text = String::from_utf8(forwarded).unwrap();
        assert!(text.contains("upstream exploded"));
    }

    #[test]
    fn missing_body_is_an_error() {
        let raw = "HTTP/1.0 200 OK\r\n\r\n";
        let mut forwarded = Vec::new();
        assert!(forward_response(Cursor::new(raw), &mut forwarded).is_err());
    }
}
