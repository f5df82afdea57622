//! Outbound response model, fixed status reasons and engine bodies.

use crate::server::request::RequestContext;
use crate::transport::SendState;

/// Content type attached to every engine-generated body.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Body sent when no route matches. Emitted byte for byte.
pub const NOT_FOUND_BODY: &str = "{\"message\":\"Not Found\"}";

/// Body sent when the auth predicate rejects a request. References the
/// configured auth header name so clients know what to send.
pub fn unauthorized_body(auth_header: &str) -> String {
    format!("{{\"message\":\"Forbidden - a valid `{auth_header}` header must be sent.\"}}")
}

/// Reason phrases emitted on the wire. This table is part of the external
/// contract and must not grow or change.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// One outbound response, paired 1:1 with its [`RequestContext`].
///
/// Handlers mutate the body and status; the engine owns delivery. For
/// streaming responses `is_final` is the flag a resume callback sets on its
/// last chunk.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub status: u16,
    pub body: String,
    pub content_type: String,
    pub is_final: bool,
    /// Extra headers shaped by policy (e.g. CORS) before the handler runs.
    pub headers: Vec<(String, String)>,
}

impl ResponseContext {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            is_final: false,
            headers: Vec::new(),
        }
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self::new(200)
    }
}

/// Terminal synchronous delivery: start the response and send the whole
/// body as one final chunk. Consumes both contexts, releasing them on
/// return.
pub fn send_response(req: RequestContext, res: ResponseContext) {
    let mut channel = req.channel;
    let mut headers = res.headers;
    headers.push(("Content-Type".to_string(), res.content_type));
    channel.start(res.status, status_reason(res.status), &headers);
    channel.send_chunk(res.body.as_bytes(), SendState::Final);
}
