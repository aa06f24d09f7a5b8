/// Integration tests: run the gateway on an ephemeral port with a stubbed
/// upstream and a temp-file store, then drive it over real sockets.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use placegate_db::Store;
use placegate_db::statement::{QueryStatement, QueryTemplate};
use placegate_gateway::upstream::Upstream;
use placegate_gateway::{Gateway, GatewayConfig, GatewayHandle};
use placegate_types::api::PlaceResponse;
use placegate_types::models::SearchKind;
use uuid::Uuid;

const NEARBY_BODY: &str = r#"{"status":"OK","results":[{"place_id":"p1","geometry":{"location":{"lat":1.0,"lng":2.0}}}]}"#;

/// Canned upstream: streams a fixed header block and body to the client and
/// counts how often it was called.
struct StubUpstream {
    body: String,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubUpstream {
    fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(body: &str, delay: Duration) -> Self {
        Self {
            body: body.to_string(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Upstream for StubUpstream {
    fn search(
        &self,
        _kind: SearchKind,
        _raw_query: &str,
        client: &mut dyn Write,
    ) -> anyhow::Result<PlaceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);

        client.write_all(b"HTTP/1.0 200 OK\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n")?;
        client.write_all(self.body.as_bytes())?;
        client.write_all(b"\r\n")?;

        Ok(serde_json::from_str(&self.body)?)
    }
}

struct TestGateway {
    handle: Option<GatewayHandle>,
    store: Arc<Store>,
    db_path: PathBuf,
}

impl TestGateway {
    fn start(name: &str, upstream: Arc<dyn Upstream>, allow_anonymous: bool) -> Self {
        let db_path = std::env::temp_dir().join(format!("placegate_gateway_test_{name}.db"));
        let _ = std::fs::remove_file(&db_path);
        let store = Arc::new(Store::open(&db_path).unwrap());

        let config = GatewayConfig {
            port: 0,
            workers: 4,
            allow_anonymous,
            ..GatewayConfig::default()
        };
        let handle = Gateway::new(config, Some(store.clone()), upstream)
            .start()
            .unwrap();

        Self {
            handle: Some(handle),
            store,
            db_path,
        }
    }

    fn addr(&self) -> SocketAddr {
        let addr = self.handle.as_ref().unwrap().local_addr();
        SocketAddr::new([127, 0, 0, 1].into(), addr.port())
    }

    fn search_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.store
            .execute_query(&QueryStatement::build(
                &QueryTemplate::searches(20),
                &HashMap::new(),
            ))
            .unwrap()
    }

    fn result_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.store
            .execute_query(&QueryStatement::build(
                &QueryTemplate::results(20),
                &HashMap::new(),
            ))
            .unwrap()
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
        }
        let _ = std::fs::remove_file(&self.db_path);
    }
}

fn request(addr: SocketAddr, target: &str) -> String {
    raw_request(addr, &format!("GET {target} HTTP/1.1"))
}

fn raw_request(addr: SocketAddr, line: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\r\n\r\n").unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn nearby_search_streams_the_raw_body_and_persists_one_search_and_one_result() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("nearby", upstream.clone(), true);

    let response = request(
        gw.addr(),
        "/nearbysearch?location=-33.8670522,151.1957362&radius=500&types=food&name=cruise",
    );

    // The upstream response is streamed through unmodified
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains(NEARBY_BODY));
    assert_eq!(upstream.calls(), 1);

    let searches = gw.search_rows();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0]["location"], "-33.8670522,151.1957362");
    assert_eq!(searches[0]["radius"], "500");
    assert_eq!(searches[0]["types"], "food");
    assert_eq!(searches[0]["name"], "cruise");
    assert!(searches[0]["username"].is_null());

    let results = gw.result_rows();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["placeid"], "p1");
    assert_eq!(results[0]["lat"], 1.0);
    assert_eq!(results[0]["lng"], 2.0);
    // search and results share the session id
    assert_eq!(results[0]["sessionid"], searches[0]["sessionid"]);
}

#[test]
fn unsuccessful_upstream_status_is_streamed_but_not_persisted() {
    let body = r#"{"status":"ZERO_RESULTS","results":[]}"#;
    let upstream = Arc::new(StubUpstream::new(body));
    let gw = TestGateway::start("zero_results", upstream.clone(), true);

    let response = request(gw.addr(), "/textsearch?query=nowhere");
    assert!(response.contains("ZERO_RESULTS"));
    assert_eq!(upstream.calls(), 1);
    assert!(gw.search_rows().is_empty());
    assert!(gw.result_rows().is_empty());
}

#[test]
fn malformed_request_lines_are_rejected_before_any_side_effect() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("malformed", upstream.clone(), true);

    for line in [
        "POST /nearbysearch HTTP/1.1",
        "GET /nearbysearch",
        "GET /nearbysearch HTTP/2",
        "GET /nearbysearch HTTP/1.1 extra",
        "",
    ] {
        let response = raw_request(gw.addr(), line);
        assert!(
            response.contains("GATEWAY_INVALID_REQUEST"),
            "line {line:?} got: {response}"
        );
    }

    assert_eq!(upstream.calls(), 0);
    assert!(gw.search_rows().is_empty());
}

#[test]
fn unknown_paths_yield_the_invalid_url_status() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("invalid_url", upstream.clone(), true);

    let response = request(gw.addr(), "/placedetails?placeid=p1");
    assert!(response.contains("GATEWAY_INVALID_URL"));
    assert_eq!(upstream.calls(), 0);
}

#[test]
fn registered_users_authenticate_and_unknown_credentials_fail() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("auth", upstream.clone(), true);

    // Unknown credentials are rejected before the upstream is touched
    let response = request(
        gw.addr(),
        "/nearbysearch?username=invalid&password=invalid&location=0,0",
    );
    assert!(response.contains("GATEWAY_AUTHENTICATION_FAILED"));
    assert_eq!(upstream.calls(), 0);

    // Register, then search with the new credentials
    let response = request(gw.addr(), "/adduser?newusername=pkoenig&newpassword=wordpass");
    assert!(response.contains("\"OK\""));

    let response = request(
        gw.addr(),
        "/nearbysearch?username=pkoenig&password=wordpass&location=0,0",
    );
    assert!(response.contains(NEARBY_BODY));
    assert_eq!(upstream.calls(), 1);

    let searches = gw.search_rows();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0]["username"], "pkoenig");

    // Wrong password still fails after registration
    let response = request(
        gw.addr(),
        "/nearbysearch?username=pkoenig&password=passward&location=0,0",
    );
    assert!(response.contains("GATEWAY_AUTHENTICATION_FAILED"));
}

#[test]
fn duplicate_registration_reports_the_add_user_error() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("dup_register", upstream, true);

    let first = request(gw.addr(), "/adduser?newusername=pkoenig&newpassword=wordpass");
    assert!(first.contains("\"OK\""));
    let second = request(gw.addr(), "/adduser?newusername=pkoenig&newpassword=other");
    assert!(second.contains("GATEWAY_ADD_USER_ERROR"));

    let missing = request(gw.addr(), "/adduser?newusername=alone");
    assert!(missing.contains("GATEWAY_ADD_USER_ERROR"));
}

#[test]
fn anonymous_requests_are_rejected_when_disabled() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("anon_disabled", upstream.clone(), false);

    let response = request(gw.addr(), "/nearbysearch?location=0,0");
    assert!(response.contains("GATEWAY_AUTHENTICATION_FAILED"));
    assert_eq!(upstream.calls(), 0);
}

#[test]
fn result_query_returns_recent_rows_newest_first() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("result_query", upstream, true);

    // Seed rows directly, with distinct timestamps
    for i in 0..3 {
        let timestamp = format!("2026-08-07T10:00:0{i}+00:00");
        let result: PlaceResponse =
            serde_json::from_str(&NEARBY_BODY.replace("p1", &format!("p{i}"))).unwrap();
        gw.store
            .insert_results(Uuid::new_v4(), &timestamp, None, &result.results)
            .unwrap();
    }

    let response = request(gw.addr(), "/resultquery");
    assert!(response.contains("\"status\": \"OK\""));
    let p2 = response.find("p2").unwrap();
    let p0 = response.find("p0").unwrap();
    assert!(p2 < p0, "rows should be ordered newest first");

    // Filtering on an allow-listed parameter narrows the rows
    let response = request(gw.addr(), "/resultquery?placeid=p1");
    assert!(response.contains("p1"));
    assert!(!response.contains("p0"));
    assert!(!response.contains("p2"));
}

#[test]
fn search_query_filters_on_allow_listed_parameters() {
    let upstream = Arc::new(StubUpstream::new(NEARBY_BODY));
    let gw = TestGateway::start("search_query", upstream, true);

    request(gw.addr(), "/nearbysearch?location=1,1&name=cruise");
    request(gw.addr(), "/textsearch?query=restaurants+in+Sydney");

    let all = request(gw.addr(), "/searchquery");
    assert!(all.contains("cruise"));
    assert!(all.contains("restaurants+in+Sydney"));

    let filtered = request(gw.addr(), "/searchquery?name=cruise");
    assert!(filtered.contains("cruise"));
    assert!(!filtered.contains("restaurants+in+Sydney"));
}

#[test]
fn shutdown_completes_in_flight_requests_and_refuses_new_connections() {
    let upstream = Arc::new(StubUpstream::slow(NEARBY_BODY, Duration::from_millis(400)));
    let mut gw = TestGateway::start("shutdown", upstream, true);
    let addr = gw.addr();

    // Fire a request that will still be inside the worker when shutdown
    // begins
    let in_flight = thread::spawn(move || request(addr, "/nearbysearch?location=0,0"));
    thread::sleep(Duration::from_millis(120));

    gw.handle.take().unwrap().shutdown();

    let response = in_flight.join().unwrap();
    assert!(
        response.contains(NEARBY_BODY),
        "in-flight request must deliver its response"
    );

    assert!(
        TcpStream::connect(addr).is_err(),
        "listener must be closed after shutdown"
    );
}
