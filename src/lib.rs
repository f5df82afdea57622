//! # Warthog
//!
//! Warthog is the request-dispatch and response-delivery core of an
//! embedded HTTP server, built on the `may` coroutine runtime. It sits
//! between a low-level evented transport and application route handlers:
//! requests come in parsed, get matched against a registration-ordered
//! route table, pass the CORS and auth gates, and leave as responses:
//! immediately, later from another thread, or chunk by chunk.
//!
//! ## Architecture
//!
//! - **[`router`]** - registration-ordered route table with `:name`
//!   capture segments, first match wins
//! - **[`dispatcher`]** - the dispatch pipeline: CORS gate, route match,
//!   auth predicate, handler invocation
//! - **[`bus`]** - cross-thread message bus; the only way worker threads
//!   reach the reactor thread
//! - **[`streaming`]** - resumable multi-chunk response state machine
//! - **[`server`]** - request/response model, lifecycle and the
//!   `may_minihttp` transport adapter
//! - **[`transport`]** - the narrow reactor boundary the core consumes
//! - **[`tls`]** - certificate/key material loading for the transport
//! - **[`config`]** - YAML/programmatic server configuration
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use warthog::config::ServerConfig;
//! use warthog::dispatcher::HandlerOutcome;
//! use warthog::server::{HttpServer, RequestContext, ResponseContext};
//!
//! let server = HttpServer::builder(ServerConfig::default())
//!     .get(
//!         "/status",
//!         Arc::new(|req: RequestContext, mut res: ResponseContext| {
//!             res.set_body("{\"ok\":true}");
//!             HandlerOutcome::Complete(req, res)
//!         }),
//!         false,
//!     )
//!     .build();
//! server.run().expect("server failed to start");
//! ```
//!
//! ## Concurrency model
//!
//! A single reactor thread owns route lookups, response sends and
//! streaming sessions. Worker threads never touch request or response
//! contexts directly; they send messages through [`bus::BusSender`] and a
//! registered handler finishes the delivery on the reactor thread.

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod streaming;
pub mod tls;
pub mod transport;

pub use bus::{BusSender, MessageBus, MessagePayload, STOP_SERVER_MESSAGE};
pub use config::ServerConfig;
pub use dispatcher::{
    AllowAll, AuthPolicy, Dispatcher, DispatchOutcome, HandlerOutcome, RouteHandler,
};
pub use router::{Route, RouteTable, Segment};
pub use server::{HttpServer, InboundRequest, RequestContext, ResponseContext, StopHandle};
pub use streaming::{StreamState, StreamingSession};
pub use transport::{ResponseChannel, SendState};
