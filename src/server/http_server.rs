//! Server lifecycle: builder, run loop, stop and teardown.
//!
//! `run` owns the reactor loop: after binding the listener it parks on the
//! message bus and drains batches until the stop flag is observed. The flag
//! is checked once per loop iteration, so shutdown is observed on the next
//! turn, not instantaneously.

use crate::bus::{BusSender, MessageBus, MessagePayload, STOP_SERVER_MESSAGE};
use crate::config::ServerConfig;
use crate::dispatcher::{AllowAll, AuthPolicy, Dispatcher, RouteHandler};
use crate::router::{RouteTable, RouteTableBuilder};
use crate::server::listener;
use crate::server::service::CoreService;
use crate::tls::{load_tls_material, TlsError};
use http::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Startup failures are fatal: reported to the caller of `run`, no retry.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration phase of the server. Routes, message handlers and the
/// auth policy are fixed here; once `build` runs, the registries are
/// frozen and serving may begin.
pub struct ServerBuilder {
    config: ServerConfig,
    routes: RouteTableBuilder,
    auth: Arc<dyn AuthPolicy>,
    bus: MessageBus,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RouteTable::builder(),
            auth: Arc::new(AllowAll),
            bus: MessageBus::new(),
        }
    }

    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn RouteHandler>,
        is_async: bool,
    ) -> Self {
        self.routes = self.routes.route(method, pattern, handler, is_async);
        self
    }

    pub fn get(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::GET, pattern, handler, is_async)
    }

    pub fn post(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::POST, pattern, handler, is_async)
    }

    pub fn put(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::PUT, pattern, handler, is_async)
    }

    pub fn delete(self, pattern: &str, handler: Arc<dyn RouteHandler>, is_async: bool) -> Self {
        self.route(Method::DELETE, pattern, handler, is_async)
    }

    pub fn auth_policy(mut self, policy: Arc<dyn AuthPolicy>) -> Self {
        self.auth = policy;
        self
    }

    /// Producer half of the message bus. Available already at build time
    /// so route handlers can capture it for deferred delivery.
    pub fn bus_sender(&self) -> BusSender {
        self.bus.sender()
    }

    /// Register a message-bus handler. First registration per type wins.
    pub fn on_message<F>(mut self, kind: &str, handler: F) -> Self
    where
        F: FnMut(MessagePayload) + Send + 'static,
    {
        self.bus.register(kind, handler);
        self
    }

    pub fn build(self) -> HttpServer {
        HttpServer {
            config: self.config,
            table: Arc::new(self.routes.build()),
            auth: self.auth,
            bus: self.bus,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Cloneable shutdown handle, usable from any thread.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    sender: BusSender,
}

impl StopHandle {
    /// Request shutdown: set the stop flag, then send the stop message so
    /// a loop parked with nothing pending wakes up and observes it.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
        self.sender.send(STOP_SERVER_MESSAGE, Box::new(()));
    }
}

/// The assembled server: frozen route table, auth policy, message bus and
/// listener configuration.
pub struct HttpServer {
    config: ServerConfig,
    table: Arc<RouteTable>,
    auth: Arc<dyn AuthPolicy>,
    bus: MessageBus,
    stop_flag: Arc<AtomicBool>,
}

impl HttpServer {
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// Producer half of the message bus, for worker threads.
    pub fn sender(&self) -> BusSender {
        self.bus.sender()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: self.stop_flag.clone(),
            sender: self.bus.sender(),
        }
    }

    /// Run the server until stopped. Binds the listener, then parks on the
    /// message bus, delivering each drained batch on this thread, which is
    /// the reactor thread as far as the core is concerned.
    pub fn run(mut self) -> Result<(), StartupError> {
        ignore_sigpipe();

        let tls_material = match &self.config.tls {
            Some(settings) => Some(load_tls_material(settings)?),
            None => None,
        };

        let dispatcher = Arc::new(Dispatcher::new(
            self.table.clone(),
            self.auth.clone(),
            self.config.cors_enabled,
            &self.config.auth_header,
        ));
        let service = CoreService { dispatcher };

        let addr = format!("{}:{}", self.config.listen_address, self.config.listen_port);
        let handle = match listener::bind(&addr, service) {
            Ok(h) => h,
            Err(source) => {
                error!(%addr, error = %source, "Failed to bind listener");
                return Err(StartupError::Bind { addr, source });
            }
        };
        info!(%addr, tls = tls_material.is_some(), "Server started, ready to accept requests");

        while !self.stop_flag.load(Ordering::Acquire) {
            if !self.bus.park() {
                // Every sender gone; nothing can ever wake us again.
                break;
            }
        }

        // Teardown: stop accepting, then discard whatever is still queued.
        // Handlers are not invoked for discarded messages; the objects they
        // reference may no longer be live.
        handle.stop();
        let discarded = self.bus.discard_pending();
        if discarded > 0 {
            debug!(discarded, "Discarded queued messages during teardown");
        }
        drop(tls_material);
        info!("Server stopped");
        Ok(())
    }
}

#[cfg(unix)]
fn ignore_sigpipe() {
    // A peer resetting mid-write must surface as an io error, not kill the
    // process.
    unsafe {
        let _ = signal_hook::low_level::register(signal_hook::consts::SIGPIPE, || {});
    }
}

#[cfg(not(unix))]
fn ignore_sigpipe() {}
