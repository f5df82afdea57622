//! Transport adapter bridging `may_minihttp` requests into the dispatcher.
//!
//! Each connection coroutine parses the raw request, hands it to the
//! dispatcher with a reply channel, then blocks on that channel until the
//! final chunk arrives. Synchronous responses complete immediately;
//! deferred deliveries arrive once the reactor loop drains the message bus;
//! streaming sessions are driven to completion here because the buffered
//! transport flushes instantly, making every chunk immediately resumable.

use crate::dispatcher::{Dispatcher, DispatchOutcome};
use crate::server::request::InboundRequest;
use crate::streaming::StreamState;
use crate::transport::{ResponseChannel, SendState};
use may::sync::mpsc;
use may_minihttp::{HttpService, Request, Response};
use std::collections::HashMap;
use std::io;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

enum WireEvent {
    Start {
        status: u16,
        reason: &'static str,
        headers: Vec<(String, String)>,
    },
    Chunk {
        bytes: Vec<u8>,
        last: bool,
    },
}

/// Reply channel given to the dispatcher for every request. Sends are safe
/// from any thread; the connection coroutine is the single consumer.
struct ReplyChannel {
    tx: mpsc::Sender<WireEvent>,
}

impl ResponseChannel for ReplyChannel {
    fn start(&mut self, status: u16, reason: &'static str, headers: &[(String, String)]) {
        let _ = self.tx.send(WireEvent::Start {
            status,
            reason,
            headers: headers.to_vec(),
        });
    }

    fn send_chunk(&mut self, chunk: &[u8], state: SendState) {
        let _ = self.tx.send(WireEvent::Chunk {
            bytes: chunk.to_vec(),
            last: state == SendState::Final,
        });
    }
}

/// `HttpService` implementation serving the dispatch core.
#[derive(Clone)]
pub struct CoreService {
    pub dispatcher: Arc<Dispatcher>,
}

impl HttpService for CoreService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let method = match req.method().parse() {
            Ok(m) => m,
            Err(_) => {
                res.status_code(400, "Bad Request");
                res.header("Content-Type: application/json; charset=utf-8");
                res.body_vec(b"{\"message\":\"Bad Request\"}".to_vec());
                return Ok(());
            }
        };
        let path = req.path().to_string();

        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .map(|h| {
                (
                    h.name.to_ascii_lowercase(),
                    String::from_utf8_lossy(h.value).to_string(),
                )
            })
            .collect();

        let mut body = String::new();
        let _ = req.body().read_to_string(&mut body);

        let inbound = InboundRequest {
            method,
            path,
            headers,
            body,
        };

        let (tx, rx) = mpsc::channel();
        let outcome = self
            .dispatcher
            .dispatch(inbound, Box::new(ReplyChannel { tx }));

        match outcome {
            DispatchOutcome::Responded | DispatchOutcome::Deferred => {}
            DispatchOutcome::Streaming(mut session) => {
                // Buffered transport: queued bytes are "flushed" as soon as
                // they are sent, so each chunk is immediately resumable.
                while session.resume() == StreamState::Active {}
            }
        }

        // Rendezvous: collect wire events until the final chunk. For a
        // deferred route this parks the coroutine until a worker delivers
        // through the message bus.
        let mut status = 500u16;
        let mut reason = "Internal Server Error";
        let mut resp_headers: Vec<(String, String)> = Vec::new();
        let mut resp_body: Vec<u8> = Vec::new();
        while let Ok(event) = rx.recv() {
            match event {
                WireEvent::Start {
                    status: s,
                    reason: r,
                    headers: h,
                } => {
                    status = s;
                    reason = r;
                    resp_headers = h;
                }
                WireEvent::Chunk { bytes, last } => {
                    resp_body.extend_from_slice(&bytes);
                    if last {
                        break;
                    }
                }
            }
        }

        debug!(status, body_bytes = resp_body.len(), "Response assembled");

        res.status_code(status as usize, reason);
        for (name, value) in resp_headers {
            let line = format!("{name}: {value}").into_boxed_str();
            res.header(Box::leak(line));
        }
        res.body_vec(resp_body);
        Ok(())
    }
}
