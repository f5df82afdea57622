//! Cross-thread message bus.
//!
//! Reactor-owned objects (requests, responses, connections) may only be
//! touched on the reactor thread; this bus is the sole sanctioned way for
//! other threads to schedule work there. Producers clone a [`BusSender`]
//! and `send` from anywhere; the reactor thread parks on the queue and
//! drains batches in FIFO arrival order.
//!
//! Delivery is at-most-once. An envelope whose type has no registered
//! handler is silently dropped; that is a documented quirk, not an error.

use may::sync::mpsc;
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Built-in message type pre-registered with a no-op handler. Its sole
/// purpose is to wake a parked loop during shutdown; loop termination is
/// driven by the server's stop flag, not by this message.
pub const STOP_SERVER_MESSAGE: &str = "stop_server";

/// Opaque payload carried by one envelope. Handlers downcast to the
/// concrete type agreed for their message type.
pub type MessagePayload = Box<dyn Any + Send>;

/// Handler capability for one message type.
pub type MessageHandler = Box<dyn FnMut(MessagePayload) + Send>;

struct Envelope {
    kind: String,
    payload: MessagePayload,
}

/// Cloneable producer half, safe to hand to any worker thread.
#[derive(Clone)]
pub struct BusSender {
    tx: mpsc::Sender<Envelope>,
}

impl BusSender {
    /// Enqueue one message and wake the reactor loop if it is parked.
    /// Returns false when the consuming side is gone.
    pub fn send(&self, kind: impl Into<String>, payload: MessagePayload) -> bool {
        self.tx
            .send(Envelope {
                kind: kind.into(),
                payload,
            })
            .is_ok()
    }
}

/// Consumer half plus the handler registry. Lives on the reactor thread;
/// registration happens before the loop starts.
pub struct MessageBus {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
    handlers: HashMap<String, MessageHandler>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let mut bus = Self {
            tx,
            rx,
            handlers: HashMap::new(),
        };
        bus.register(STOP_SERVER_MESSAGE, |_payload| {});
        bus
    }

    pub fn sender(&self) -> BusSender {
        BusSender {
            tx: self.tx.clone(),
        }
    }

    /// Register a handler for a message type. First registration wins:
    /// a later registration for an already-registered type is ignored.
    pub fn register<F>(&mut self, kind: &str, handler: F)
    where
        F: FnMut(MessagePayload) + Send + 'static,
    {
        match self.handlers.entry(kind.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Box::new(handler));
            }
            Entry::Occupied(_) => {
                debug!(kind, "Message handler already registered; ignoring");
            }
        }
    }

    /// Park until at least one message arrives, then deliver it and drain
    /// everything else queued behind it. Returns false when every sender
    /// has been dropped.
    pub fn park(&mut self) -> bool {
        match self.rx.recv() {
            Ok(envelope) => {
                self.deliver(envelope);
                self.drain();
                true
            }
            Err(_) => false,
        }
    }

    /// Deliver all currently queued envelopes in FIFO arrival order.
    /// Returns the number consumed.
    pub fn drain(&mut self) -> usize {
        let mut consumed = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            self.deliver(envelope);
            consumed += 1;
        }
        consumed
    }

    /// Teardown path: drop any remaining envelopes without invoking their
    /// handlers. Handlers may reference objects that are no longer live
    /// once shutdown has begun.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn deliver(&mut self, envelope: Envelope) {
        match self.handlers.get_mut(&envelope.kind) {
            Some(handler) => handler(envelope.payload),
            None => debug!(kind = %envelope.kind, "No handler for message type; dropped"),
        }
        // Envelope payload is dropped here either way.
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
