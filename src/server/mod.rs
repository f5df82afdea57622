pub mod http_server;
pub mod listener;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerBuilder, StartupError, StopHandle};
pub use listener::ListenerHandle;
pub use request::{parse_query, InboundRequest, RequestContext};
pub use response::{
    send_response, status_reason, unauthorized_body, ResponseContext, JSON_CONTENT_TYPE,
    NOT_FOUND_BODY,
};
pub use service::CoreService;
