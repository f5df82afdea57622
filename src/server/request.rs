//! Inbound request model and query-string parsing.

use crate::transport::ResponseChannel;
use http::Method;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Raw request material handed over by the transport adapter.
///
/// `path` still carries the query string; the dispatcher strips it. Header
/// names are lowercased by the adapter, matching what the reactor layer
/// delivers.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// One dispatched request, owned by whoever is responsible for the next
/// pipeline stage: the dispatcher until the handler is invoked, then the
/// handler, a streaming session or a deferred-delivery job.
///
/// Owns the response channel into the reactor, so dropping the context on
/// any exit path releases the connection resources exactly once.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Query parameters merged with path captures; query wins on conflict.
    pub params: HashMap<String, String>,
    pub body: String,
    /// Auth token from the configured header, or its query-parameter
    /// fallback. Empty when the request carried neither.
    pub auth_token: String,
    pub(crate) channel: Box<dyn ResponseChannel>,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish()
    }
}

/// Parse a query string of `key=value` pairs separated by `&`.
///
/// Values are percent-decoded. A duplicated key does not overwrite: the
/// values are concatenated with a literal `"&&"` in encounter order, so
/// `a=1&a=2` yields `a == "1&&2"`. Pairs without `=` and pairs with an
/// empty key are skipped.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        let Some((key, raw_value)) = pair.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let value = match urlencoding::decode(raw_value) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw_value.to_string(),
        };
        match params.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let joined = slot.get_mut();
                joined.push_str("&&");
                joined.push_str(&value);
            }
        }
    }
    debug!(param_count = params.len(), "Query string parsed");
    params
}
