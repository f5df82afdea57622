//! Dispatch pipeline tests: CORS gate, auth gate, parameter merging,
//! fixed error responses and the sync/deferred hand-off.

mod common;

use common::Wire;
use http::Method;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use warthog::dispatcher::{
    AllowAll, Dispatcher, DispatchOutcome, HandlerOutcome, RouteHandler,
};
use warthog::router::RouteTable;
use warthog::server::{send_response, InboundRequest, NOT_FOUND_BODY};
use warthog::{RequestContext, ResponseContext};

fn noop() -> Arc<dyn RouteHandler> {
    Arc::new(|req: RequestContext, res: ResponseContext| HandlerOutcome::Complete(req, res))
}

fn dispatcher_for(table: RouteTable, cors: bool) -> Dispatcher {
    Dispatcher::new(Arc::new(table), Arc::new(AllowAll), cors, "x-api-key")
}

fn inbound(method: Method, path: &str) -> InboundRequest {
    InboundRequest {
        method,
        path: path.to_string(),
        headers: HashMap::new(),
        body: String::new(),
    }
}

#[test]
fn test_no_route_matches_sends_fixed_404() {
    let dispatcher = dispatcher_for(RouteTable::builder().build(), false);
    let wire = Wire::new();

    let outcome = dispatcher.dispatch(inbound(Method::GET, "/missing"), wire.channel());
    assert!(matches!(outcome, DispatchOutcome::Responded));
    assert_eq!(wire.status(), Some(404));
    assert_eq!(wire.reason(), Some("Not Found".to_string()));
    assert_eq!(wire.body(), NOT_FOUND_BODY);
    assert_eq!(
        wire.header("Content-Type").as_deref(),
        Some("application/json; charset=utf-8")
    );
}

#[test]
fn test_sync_handler_response_is_sent_immediately() {
    let table = RouteTable::builder()
        .get(
            "/status",
            Arc::new(|req: RequestContext, mut res: ResponseContext| {
                res.status = 200;
                res.set_body("{\"ok\":true}");
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .build();
    let dispatcher = dispatcher_for(table, false);
    let wire = Wire::new();

    let outcome = dispatcher.dispatch(inbound(Method::GET, "/status"), wire.channel());
    assert!(matches!(outcome, DispatchOutcome::Responded));
    assert_eq!(wire.status(), Some(200));
    assert_eq!(wire.reason(), Some("OK".to_string()));
    assert_eq!(wire.body(), "{\"ok\":true}");
    let chunks = wire.chunks();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].1, "single synchronous chunk must be final");
}

#[test]
fn test_query_duplicates_join_with_double_ampersand() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let seen_in = seen.clone();
    let table = RouteTable::builder()
        .get(
            "/search",
            Arc::new(move |req: RequestContext, res: ResponseContext| {
                *seen_in.lock().unwrap() = req.param("a").map(str::to_string);
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .build();
    let dispatcher = dispatcher_for(table, false);
    let wire = Wire::new();

    dispatcher.dispatch(inbound(Method::GET, "/search?a=1&a=2"), wire.channel());
    assert_eq!(seen.lock().unwrap().as_deref(), Some("1&&2"));
}

#[test]
fn test_query_parameter_wins_over_path_capture() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let seen_in = seen.clone();
    let table = RouteTable::builder()
        .get(
            "/items/:id",
            Arc::new(move |req: RequestContext, res: ResponseContext| {
                *seen_in.lock().unwrap() = req.param("id").map(str::to_string);
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .build();
    let dispatcher = dispatcher_for(table, false);
    let wire = Wire::new();

    dispatcher.dispatch(inbound(Method::GET, "/items/9?id=5"), wire.channel());
    assert_eq!(seen.lock().unwrap().as_deref(), Some("5"));
}

#[test]
fn test_path_capture_bound_when_no_query_conflict() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let seen_in = seen.clone();
    let table = RouteTable::builder()
        .get(
            "/items/:id",
            Arc::new(move |req: RequestContext, res: ResponseContext| {
                *seen_in.lock().unwrap() = req.param("id").map(str::to_string);
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .build();
    let dispatcher = dispatcher_for(table, false);
    let wire = Wire::new();

    dispatcher.dispatch(inbound(Method::GET, "/items/9?limit=3"), wire.channel());
    assert_eq!(seen.lock().unwrap().as_deref(), Some("9"));
}

#[test]
fn test_failed_auth_sends_401_naming_header_once() {
    let table = RouteTable::builder().get("/private", noop(), false).build();
    let dispatcher = Dispatcher::new(
        Arc::new(table),
        Arc::new(|_route: &warthog::Route, _token: &str| false),
        false,
        "x-api-key",
    );
    let wire = Wire::new();

    let outcome = dispatcher.dispatch(inbound(Method::GET, "/private"), wire.channel());
    assert!(matches!(outcome, DispatchOutcome::Responded));
    assert_eq!(wire.status(), Some(401));
    assert_eq!(wire.reason(), Some("Unauthorized".to_string()));
    let body = wire.body();
    assert_eq!(body.matches("x-api-key").count(), 1);
    assert_eq!(
        body,
        "{\"message\":\"Forbidden - a valid `x-api-key` header must be sent.\"}"
    );
}

#[test]
fn test_mixed_case_auth_header_keeps_configured_spelling() {
    let build = || {
        let table = RouteTable::builder().get("/private", noop(), false).build();
        Dispatcher::new(
            Arc::new(table),
            Arc::new(|_route: &warthog::Route, token: &str| token == "secret"),
            false,
            "X-API-KEY",
        )
    };

    // Wire header names arrive lowercased; the lookup must still hit.
    let mut with_header = inbound(Method::GET, "/private");
    with_header
        .headers
        .insert("x-api-key".to_string(), "secret".to_string());
    let wire = Wire::new();
    build().dispatch(with_header, wire.channel());
    assert_eq!(wire.status(), Some(200));

    // Query keys are case-sensitive: the fallback uses the configured name.
    let wire = Wire::new();
    build().dispatch(
        inbound(Method::GET, "/private?X-API-KEY=secret"),
        wire.channel(),
    );
    assert_eq!(wire.status(), Some(200));

    let wire = Wire::new();
    build().dispatch(
        inbound(Method::GET, "/private?x-api-key=secret"),
        wire.channel(),
    );
    assert_eq!(wire.status(), Some(401));

    // The 401 body quotes the header exactly as configured.
    assert_eq!(
        wire.body(),
        "{\"message\":\"Forbidden - a valid `X-API-KEY` header must be sent.\"}"
    );
}

#[test]
fn test_auth_token_from_header_then_query_fallback() {
    let tokens = Arc::new(Mutex::new(Vec::<String>::new()));
    let tokens_in = tokens.clone();
    let table = RouteTable::builder().get("/private", noop(), false).build();
    let dispatcher = Dispatcher::new(
        Arc::new(table),
        Arc::new(move |_route: &warthog::Route, token: &str| {
            tokens_in.lock().unwrap().push(token.to_string());
            true
        }),
        false,
        "x-api-key",
    );

    let mut with_header = inbound(Method::GET, "/private?x-api-key=from-query");
    with_header
        .headers
        .insert("x-api-key".to_string(), "from-header".to_string());
    dispatcher.dispatch(with_header, Wire::new().channel());

    dispatcher.dispatch(
        inbound(Method::GET, "/private?x-api-key=from-query"),
        Wire::new().channel(),
    );

    dispatcher.dispatch(inbound(Method::GET, "/private"), Wire::new().channel());

    assert_eq!(
        *tokens.lock().unwrap(),
        vec!["from-header".to_string(), "from-query".to_string(), String::new()]
    );
}

#[test]
fn test_cors_preflight_bypasses_routing() {
    // No routes registered at all: preflight must still answer 200.
    let dispatcher = dispatcher_for(RouteTable::builder().build(), true);
    let wire = Wire::new();

    let mut req = inbound(Method::OPTIONS, "/anything/at/all");
    req.headers.insert(
        "access-control-request-headers".to_string(),
        "content-type, x-api-key".to_string(),
    );
    let outcome = dispatcher.dispatch(req, wire.channel());

    assert!(matches!(outcome, DispatchOutcome::Responded));
    assert_eq!(wire.status(), Some(200));
    assert_eq!(wire.body(), "");
    assert_eq!(wire.header("Access-Control-Allow-Origin").as_deref(), Some("*"));
    assert_eq!(
        wire.header("Access-Control-Allow-Methods").as_deref(),
        Some("POST, GET, DELETE, PUT, PATCH, OPTIONS")
    );
    assert_eq!(
        wire.header("Access-Control-Allow-Headers").as_deref(),
        Some("content-type, x-api-key")
    );
    assert_eq!(wire.header("Access-Control-Max-Age").as_deref(), Some("86400"));
}

#[test]
fn test_options_without_request_headers_falls_through_to_routing() {
    let dispatcher = dispatcher_for(RouteTable::builder().build(), true);
    let wire = Wire::new();

    let outcome = dispatcher.dispatch(inbound(Method::OPTIONS, "/missing"), wire.channel());
    assert!(matches!(outcome, DispatchOutcome::Responded));
    assert_eq!(wire.status(), Some(404));
}

#[test]
fn test_cors_adds_allow_origin_to_every_response() {
    let table = RouteTable::builder().get("/status", noop(), false).build();
    let dispatcher = dispatcher_for(table, true);

    let ok = Wire::new();
    dispatcher.dispatch(inbound(Method::GET, "/status"), ok.channel());
    assert_eq!(ok.header("Access-Control-Allow-Origin").as_deref(), Some("*"));

    let missing = Wire::new();
    dispatcher.dispatch(inbound(Method::GET, "/missing"), missing.channel());
    assert_eq!(missing.status(), Some(404));
    assert_eq!(
        missing.header("Access-Control-Allow-Origin").as_deref(),
        Some("*")
    );
}

#[test]
fn test_cors_disabled_adds_no_cors_headers() {
    let dispatcher = dispatcher_for(RouteTable::builder().build(), false);
    let wire = Wire::new();

    let mut req = inbound(Method::OPTIONS, "/anything");
    req.headers.insert(
        "access-control-request-headers".to_string(),
        "content-type".to_string(),
    );
    dispatcher.dispatch(req, wire.channel());
    // Preflight handling is part of CORS; disabled means plain routing.
    assert_eq!(wire.status(), Some(404));
    assert!(wire.header("Access-Control-Allow-Origin").is_none());
}

#[test]
fn test_deferred_handler_delivers_nothing_synchronously() {
    let stash = Arc::new(Mutex::new(None));
    let stash_in = stash.clone();
    let table = RouteTable::builder()
        .post(
            "/jobs",
            Arc::new(move |req: RequestContext, res: ResponseContext| {
                *stash_in.lock().unwrap() = Some((req, res));
                HandlerOutcome::Deferred
            }),
            true,
        )
        .build();
    let dispatcher = dispatcher_for(table, false);
    let wire = Wire::new();

    let outcome = dispatcher.dispatch(inbound(Method::POST, "/jobs"), wire.channel());
    assert!(matches!(outcome, DispatchOutcome::Deferred));
    assert!(wire.records().is_empty(), "nothing sent until delivery");

    // Later, on the reactor thread, the stashed pair is delivered.
    let (req, mut res) = stash.lock().unwrap().take().expect("stashed contexts");
    res.status = 201;
    res.set_body("{\"job\":\"done\"}");
    send_response(req, res);

    assert_eq!(wire.status(), Some(201));
    assert_eq!(wire.reason(), Some("Created".to_string()));
    assert_eq!(wire.body(), "{\"job\":\"done\"}");
}
