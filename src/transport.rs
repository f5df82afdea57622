//! Reactor/transport boundary.
//!
//! The core never touches sockets or wire framing itself; it consumes a
//! narrow per-request delivery capability from the surrounding reactor.
//! A channel begins exactly one response and then carries one or more body
//! chunks, each tagged with whether more chunks will follow.

/// Completion marker attached to every chunk handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// More chunks will follow on this response.
    InProgress,
    /// This is the last chunk; the transport may finish the response.
    Final,
}

/// Per-request response delivery capability supplied by the reactor.
///
/// Implementations are only ever driven from the reactor thread. `start`
/// must be called exactly once before the first chunk; after a `Final`
/// chunk the channel is dead and further calls are undefined by contract.
pub trait ResponseChannel: Send {
    /// Begin the response: status line and headers. No body bytes yet.
    fn start(&mut self, status: u16, reason: &'static str, headers: &[(String, String)]);

    /// Queue one body chunk, tagged in-progress or final.
    fn send_chunk(&mut self, chunk: &[u8], state: SendState);
}
