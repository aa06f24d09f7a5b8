use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info};

use placegate_db::Store;
use placegate_db::statement::{QueryStatement, QueryTemplate};
use placegate_types::api::{self, GatewayResponse};
use placegate_types::models::{SearchKind, SearchRecord, Session, params};

use crate::auth::CredentialValidator;
use crate::request::Request;
use crate::upstream::Upstream;

// Gateway paths (exact, case-sensitive)
pub const PATH_NEARBY_SEARCH: &str = "/nearbysearch";
pub const PATH_TEXT_SEARCH: &str = "/textsearch";
pub const PATH_RADAR_SEARCH: &str = "/radarsearch";
pub const PATH_ADD_USER: &str = "/adduser";
pub const PATH_SEARCH_QUERY: &str = "/searchquery";
pub const PATH_RESULT_QUERY: &str = "/resultquery";

/// Status line for every gateway-origin response; error envelopes ride on
/// a 200 like the upstream API's own error statuses do.
const HTTP_RESPONSE: &str = "HTTP/1.0 200 OK";

/// Everything a worker needs to drive one connection end-to-end.
pub struct ConnectionContext {
    pub validator: CredentialValidator,
    pub store: Option<Arc<Store>>,
    pub upstream: Arc<dyn Upstream>,
    pub search_template: QueryTemplate,
    pub result_template: QueryTemplate,
}

/// Run one accepted connection through its lifecycle: parse, authenticate,
/// route, respond. The socket closes when this returns, on every path, and
/// nothing escapes to the worker thread.
pub fn handle(stream: TcpStream, session: Session, ctx: &ConnectionContext) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "?".to_string());

    if let Err(e) = run(stream, session, ctx) {
        error!("Error handling connection from {peer}: {e:#}");
    }
}

fn run(mut stream: TcpStream, session: Session, ctx: &ConnectionContext) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']);

    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(_) => {
            return write_response(
                &mut stream,
                &GatewayResponse::error(
                    api::STATUS_INVALID_REQUEST,
                    "The provided request is not a valid HTTP request.",
                ),
            );
        }
    };
    debug!(session = %session.id, path = request.path(), "request parsed");

    let username = request.param(params::USERNAME);
    if !ctx
        .validator
        .validate(username, request.param(params::PASSWORD))
    {
        info!(session = %session.id, "authentication failed");
        return write_response(
            &mut stream,
            &GatewayResponse::error(
                api::STATUS_AUTHENTICATION_FAILED,
                "The provided credentials failed authentication.",
            ),
        );
    }

    match request.path() {
        PATH_NEARBY_SEARCH => {
            do_place_search(&request, SearchKind::Nearby, session, ctx, &mut stream)
        }
        PATH_TEXT_SEARCH => do_place_search(&request, SearchKind::Text, session, ctx, &mut stream),
        PATH_RADAR_SEARCH => {
            do_place_search(&request, SearchKind::Radar, session, ctx, &mut stream)
        }
        PATH_ADD_USER => add_user(&request, ctx, &mut stream),
        PATH_SEARCH_QUERY => execute_query(&request, &ctx.search_template, ctx, &mut stream),
        PATH_RESULT_QUERY => execute_query(&request, &ctx.result_template, ctx, &mut stream),
        _ => write_response(
            &mut stream,
            &GatewayResponse::error(
                api::STATUS_INVALID_URL,
                "The provided URL is unsupported or invalid.",
            ),
        ),
    }
}

/// Proxy one search upstream. The raw response streams to the client as it
/// is read; persistence happens afterwards and only for a successful
/// status. A persistence failure is logged and the client keeps whatever
/// was already streamed.
fn do_place_search(
    request: &Request,
    kind: SearchKind,
    session: Session,
    ctx: &ConnectionContext,
    client: &mut TcpStream,
) -> Result<()> {
    let response = match ctx.upstream.search(kind, request.query(), client) {
        Ok(response) => response,
        Err(e) => {
            error!(
                session = %session.id,
                "Error performing {} search upstream: {e:#}",
                kind.as_str()
            );
            return write_response(
                client,
                &GatewayResponse::error(
                    api::STATUS_SEARCH_ERROR,
                    "The place search could not be completed.",
                ),
            );
        }
    };

    if response.status == api::STATUS_OK {
        if let Some(store) = &ctx.store {
            let record = search_record(request, kind, session);
            if let Err(e) = store.insert_search(&record) {
                error!(session = %session.id, "Error writing search to store: {e:#}");
            }
            if let Err(e) = store.insert_results(
                session.id,
                &record.timestamp,
                record.username.as_deref(),
                &response.results,
            ) {
                error!(session = %session.id, "Error writing results to store: {e:#}");
            }
        }
    }

    Ok(())
}

fn search_record(request: &Request, kind: SearchKind, session: Session) -> SearchRecord {
    let param = |name: &str| request.param(name).map(str::to_string);
    SearchRecord {
        session_id: session.id,
        timestamp: session.timestamp(),
        kind,
        username: param(params::USERNAME),
        query: param(params::QUERY),
        location: param(params::LOCATION),
        radius: param(params::RADIUS),
        keyword: param(params::KEYWORD),
        language: param(params::LANGUAGE),
        minprice: param(params::MINPRICE),
        maxprice: param(params::MAXPRICE),
        name: param(params::NAME),
        opennow: param(params::OPENNOW),
        rankby: param(params::RANKBY),
        types: param(params::TYPES),
        pagetoken: param(params::PAGETOKEN),
        zagatselected: param(params::ZAGATSELECTED),
    }
}

fn add_user(request: &Request, ctx: &ConnectionContext, client: &mut TcpStream) -> Result<()> {
    let (Some(username), Some(password)) = (
        request.param(params::NEW_USERNAME),
        request.param(params::NEW_PASSWORD),
    ) else {
        return write_response(
            client,
            &GatewayResponse::error(
                api::STATUS_ADD_USER_ERROR,
                "Both newusername and newpassword are required.",
            ),
        );
    };

    match ctx.validator.add_user(username, password) {
        Ok(()) => write_response(client, &GatewayResponse::empty(api::STATUS_OK)),
        Err(e) => {
            error!("Error adding user to store: {e:#}");
            write_response(
                client,
                &GatewayResponse::error(
                    api::STATUS_ADD_USER_ERROR,
                    "The new user could not be added. A user with the same username may already exist.",
                ),
            )
        }
    }
}

fn execute_query(
    request: &Request,
    template: &QueryTemplate,
    ctx: &ConnectionContext,
    client: &mut TcpStream,
) -> Result<()> {
    let Some(store) = &ctx.store else {
        return write_response(
            client,
            &GatewayResponse::error(api::STATUS_QUERY_ERROR, "The query could not be completed."),
        );
    };

    let statement = QueryStatement::build(template, request.params());
    match store.execute_query(&statement) {
        Ok(rows) => {
            let results = rows.into_iter().map(Value::Object).collect();
            write_response(client, &GatewayResponse::ok(results))
        }
        Err(e) => {
            error!("Error executing store query: {e:#}");
            write_response(
                client,
                &GatewayResponse::error(
                    api::STATUS_QUERY_ERROR,
                    "The query could not be completed.",
                ),
            )
        }
    }
}

fn write_response<W: Write>(client: &mut W, response: &GatewayResponse) -> Result<()> {
    let body = serde_json::to_string_pretty(response)?;
    client.write_all(HTTP_RESPONSE.as_bytes())?;
    client.write_all(b"\r\n\r\n")?;
    client.write_all(body.as_bytes())?;
    client.write_all(b"\r\n")?;
    client.flush()?;
    Ok(())
}
