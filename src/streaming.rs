//! Resumable streaming-response state machine.
//!
//! A session is installed when a handler opts into multi-turn delivery and
//! exclusively owns the request/response pair and the resume callback for
//! its entire lifetime. The reactor signals it in two ways: a resume, once
//! previously queued bytes have been flushed, or an abort when the peer
//! disconnects. Both terminal transitions release the owned resources
//! exactly once, on drop.

use crate::server::request::RequestContext;
use crate::server::response::{status_reason, ResponseContext};
use crate::transport::SendState;
use tracing::debug;

/// Session state. `Final` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Active,
    Final,
    Aborted,
}

/// Resume callback: mutates the response body for the next chunk and sets
/// `is_final` on the last one. Captured state plays the role of per-session
/// user data.
pub type ResumeFn = Box<dyn FnMut(&mut RequestContext, &mut ResponseContext) + Send>;

/// One multi-turn response in flight.
pub struct StreamingSession {
    state: StreamState,
    req: RequestContext,
    res: ResponseContext,
    resume_fn: ResumeFn,
}

impl StreamingSession {
    /// Install a session: begin the response (status, reason, headers) on
    /// the wire without sending any body chunk yet. Chunks only flow on
    /// resume, so a session resumed N times sends exactly N chunks.
    pub(crate) fn begin(
        mut req: RequestContext,
        res: ResponseContext,
        resume_fn: ResumeFn,
    ) -> Self {
        let mut headers = res.headers.clone();
        headers.push(("Content-Type".to_string(), res.content_type.clone()));
        req.channel
            .start(res.status, status_reason(res.status), &headers);
        debug!(path = %req.path, "Streaming session installed");
        Self {
            state: StreamState::Active,
            req,
            res,
            resume_fn,
        }
    }

    /// One resume turn: invoke the callback exactly once, then send the
    /// current body buffer as a single chunk, tagged in-progress or, when
    /// the callback set the final flag, as the last chunk.
    ///
    /// Returns the state after the turn; on anything but
    /// [`StreamState::Active`] the owner should drop the session.
    pub fn resume(&mut self) -> StreamState {
        if self.state != StreamState::Active {
            return self.state;
        }
        (self.resume_fn)(&mut self.req, &mut self.res);
        let marker = if self.res.is_final {
            SendState::Final
        } else {
            SendState::InProgress
        };
        self.req.channel.send_chunk(self.res.body.as_bytes(), marker);
        if self.res.is_final {
            debug!(path = %self.req.path, "Streaming session finished");
            self.state = StreamState::Final;
        }
        self.state
    }

    /// Connection cancelled by the peer or transport: release everything
    /// without invoking the callback again and without sending a final
    /// chunk.
    pub fn abort(mut self) {
        if self.state == StreamState::Active {
            debug!(path = %self.req.path, "Streaming session aborted");
            self.state = StreamState::Aborted;
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }
}
