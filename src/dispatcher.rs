//! Request dispatch: CORS gate, route match, auth gate, handler invocation
//! and the hand-off to synchronous, deferred or streaming delivery.
//!
//! The dispatcher runs on the reactor thread only. Handlers are invoked
//! synchronously and are expected to return quickly; long work is deferred
//! through the message bus or spread across streaming resumes so the single
//! reactor thread is never stalled.

use crate::router::{split_segments, Route, RouteTable};
use crate::server::request::{parse_query, InboundRequest, RequestContext};
use crate::server::response::{
    send_response, status_reason, unauthorized_body, ResponseContext, JSON_CONTENT_TYPE,
    NOT_FOUND_BODY,
};
use crate::streaming::{ResumeFn, StreamingSession};
use crate::transport::{ResponseChannel, SendState};
use http::Method;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a handler did with its request/response pair.
///
/// Ownership of the contexts encodes the delivery contract: a handler that
/// completed returns them for the dispatcher to send; a handler that
/// deferred has moved them into whatever will deliver later (typically a
/// worker thread replying through the message bus); a streaming handler
/// surrenders them to the session.
pub enum HandlerOutcome {
    /// Response is ready; the dispatcher sends it now.
    Complete(RequestContext, ResponseContext),
    /// The handler took ownership and will deliver from the reactor thread
    /// later, via the message bus.
    Deferred,
    /// Install a streaming session; chunks are produced on each resume.
    Stream {
        req: RequestContext,
        res: ResponseContext,
        resume: ResumeFn,
    },
}

impl HandlerOutcome {
    /// Convenience constructor boxing a resume closure.
    pub fn stream<F>(req: RequestContext, res: ResponseContext, resume: F) -> Self
    where
        F: FnMut(&mut RequestContext, &mut ResponseContext) + Send + 'static,
    {
        HandlerOutcome::Stream {
            req,
            res,
            resume: Box::new(resume),
        }
    }
}

/// Handler capability for one route. Closures carrying captured state
/// implement this via the blanket impl below.
pub trait RouteHandler: Send + Sync {
    fn handle(&self, req: RequestContext, res: ResponseContext) -> HandlerOutcome;
}

impl<F> RouteHandler for F
where
    F: Fn(RequestContext, ResponseContext) -> HandlerOutcome + Send + Sync,
{
    fn handle(&self, req: RequestContext, res: ResponseContext) -> HandlerOutcome {
        self(req, res)
    }
}

/// Caller-supplied authentication predicate over (route, token). The core
/// never interprets the token's contents.
pub trait AuthPolicy: Send + Sync {
    fn authorize(&self, route: &Route, token: &str) -> bool;
}

impl<F> AuthPolicy for F
where
    F: Fn(&Route, &str) -> bool + Send + Sync,
{
    fn authorize(&self, route: &Route, token: &str) -> bool {
        self(route, token)
    }
}

/// Permissive default policy.
pub struct AllowAll;

impl AuthPolicy for AllowAll {
    fn authorize(&self, _route: &Route, _token: &str) -> bool {
        true
    }
}

/// Result of one dispatch, telling the transport adapter who now owns
/// response delivery.
pub enum DispatchOutcome {
    /// A response was sent synchronously (handler result, 404, 401 or a
    /// CORS preflight). Both contexts are already released.
    Responded,
    /// An async handler owns the contexts and will deliver later.
    Deferred,
    /// A streaming session was installed; the caller drives its resumes.
    Streaming(StreamingSession),
}

/// Reactor-thread request dispatcher over an immutable route table.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    auth: Arc<dyn AuthPolicy>,
    cors_enabled: bool,
    /// Auth header name as configured. Query-parameter fallback keys are
    /// case-sensitive and the 401 body quotes this spelling.
    auth_header: String,
    /// Lowercased form for the wire-header lookup; the adapter lowercases
    /// header names on arrival.
    auth_header_wire: String,
}

impl Dispatcher {
    pub fn new(
        table: Arc<RouteTable>,
        auth: Arc<dyn AuthPolicy>,
        cors_enabled: bool,
        auth_header: &str,
    ) -> Self {
        Self {
            table,
            auth,
            cors_enabled,
            auth_header: auth_header.to_string(),
            auth_header_wire: auth_header.to_ascii_lowercase(),
        }
    }

    /// Run the full dispatch pipeline for one inbound request.
    ///
    /// Order matters and is part of the contract: CORS preflight
    /// short-circuits before routing; the auth gate runs after route match
    /// but before path captures are merged; query parameters win over
    /// captures of the same name.
    pub fn dispatch(
        &self,
        inbound: InboundRequest,
        mut channel: Box<dyn ResponseChannel>,
    ) -> DispatchOutcome {
        let InboundRequest {
            method,
            path: full_path,
            headers,
            body,
        } = inbound;

        let (path, query) = match full_path.split_once('?') {
            Some((p, q)) => (p, q),
            None => (full_path.as_str(), ""),
        };
        let mut params = parse_query(query);

        // Auth token: fixed header first, query parameter fallback under
        // the configured spelling.
        let auth_token = headers
            .get(&self.auth_header_wire)
            .or_else(|| params.get(&self.auth_header))
            .cloned()
            .unwrap_or_default();

        let mut policy_headers: Vec<(String, String)> = Vec::new();
        if self.cors_enabled {
            policy_headers.push(("Access-Control-Allow-Origin".to_string(), "*".to_string()));

            if method == Method::OPTIONS {
                if let Some(requested) = headers.get("access-control-request-headers") {
                    // Preflight bypasses routing entirely.
                    debug!(path, "CORS preflight short-circuit");
                    let mut preflight = policy_headers.clone();
                    preflight.push((
                        "Access-Control-Allow-Methods".to_string(),
                        "POST, GET, DELETE, PUT, PATCH, OPTIONS".to_string(),
                    ));
                    preflight
                        .push(("Access-Control-Allow-Headers".to_string(), requested.clone()));
                    preflight.push(("Access-Control-Max-Age".to_string(), "86400".to_string()));
                    channel.start(200, status_reason(200), &preflight);
                    channel.send_chunk(b"", SendState::Final);
                    return DispatchOutcome::Responded;
                }
            }
        }

        let segments = split_segments(path);
        let Some(route) = self.table.find(&method, &segments) else {
            debug!(%method, path, "No route matched");
            respond_fixed(channel, 404, NOT_FOUND_BODY, policy_headers);
            return DispatchOutcome::Responded;
        };

        if !self.auth.authorize(route, &auth_token) {
            debug!(%method, path, pattern = %route.pattern, "Auth predicate rejected request");
            let body = unauthorized_body(&self.auth_header);
            respond_fixed(channel, 401, &body, policy_headers);
            return DispatchOutcome::Responded;
        }

        // Merge path captures without overwriting query parameters.
        for (name, value) in route.captures(&segments) {
            params
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }

        debug!(%method, path, pattern = %route.pattern, "Route matched");

        let req = RequestContext {
            method,
            path: path.to_string(),
            params,
            body,
            auth_token,
            channel,
        };
        let mut res = ResponseContext::new(200);
        res.headers = policy_headers;

        match route.handler.handle(req, res) {
            HandlerOutcome::Complete(req, res) => {
                if route.is_async {
                    warn!(
                        pattern = %route.pattern,
                        "Async route completed synchronously; sending immediately"
                    );
                }
                send_response(req, res);
                DispatchOutcome::Responded
            }
            HandlerOutcome::Deferred => {
                if !route.is_async {
                    warn!(
                        pattern = %route.pattern,
                        "Handler deferred on a route not marked async"
                    );
                }
                DispatchOutcome::Deferred
            }
            HandlerOutcome::Stream { req, res, resume } => {
                DispatchOutcome::Streaming(StreamingSession::begin(req, res, resume))
            }
        }
    }
}

/// Engine-generated terminal reply with a fixed JSON body.
fn respond_fixed(
    mut channel: Box<dyn ResponseChannel>,
    status: u16,
    body: &str,
    mut headers: Vec<(String, String)>,
) {
    headers.push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
    channel.start(status, status_reason(status), &headers);
    channel.send_chunk(body.as_bytes(), SendState::Final);
}
