//! Shared test fixtures: a recording response channel standing in for the
//! reactor's wire.

use std::sync::{Arc, Mutex};
use warthog::transport::{ResponseChannel, SendState};

#[derive(Debug, Clone, PartialEq)]
pub enum WireRecord {
    Start {
        status: u16,
        reason: String,
        headers: Vec<(String, String)>,
    },
    Chunk {
        body: Vec<u8>,
        last: bool,
    },
}

/// Shared recording of everything a channel was asked to send.
#[derive(Clone, Default)]
pub struct Wire {
    records: Arc<Mutex<Vec<WireRecord>>>,
}

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> Box<dyn ResponseChannel> {
        Box::new(RecordingChannel { wire: self.clone() })
    }

    pub fn records(&self) -> Vec<WireRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn status(&self) -> Option<u16> {
        self.records().iter().find_map(|r| match r {
            WireRecord::Start { status, .. } => Some(*status),
            _ => None,
        })
    }

    pub fn reason(&self) -> Option<String> {
        self.records().iter().find_map(|r| match r {
            WireRecord::Start { reason, .. } => Some(reason.clone()),
            _ => None,
        })
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        self.records()
            .iter()
            .find_map(|r| match r {
                WireRecord::Start { headers, .. } => Some(headers.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// All chunks sent so far, with their completion markers.
    pub fn chunks(&self) -> Vec<(Vec<u8>, bool)> {
        self.records()
            .iter()
            .filter_map(|r| match r {
                WireRecord::Chunk { body, last } => Some((body.clone(), *last)),
                _ => None,
            })
            .collect()
    }

    /// Concatenated body across all chunks.
    pub fn body(&self) -> String {
        let bytes: Vec<u8> = self
            .chunks()
            .into_iter()
            .flat_map(|(body, _)| body)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

struct RecordingChannel {
    wire: Wire,
}

impl ResponseChannel for RecordingChannel {
    fn start(&mut self, status: u16, reason: &'static str, headers: &[(String, String)]) {
        self.wire.records.lock().unwrap().push(WireRecord::Start {
            status,
            reason: reason.to_string(),
            headers: headers.to_vec(),
        });
    }

    fn send_chunk(&mut self, chunk: &[u8], state: SendState) {
        self.wire.records.lock().unwrap().push(WireRecord::Chunk {
            body: chunk.to_vec(),
            last: state == SendState::Final,
        });
    }
}
