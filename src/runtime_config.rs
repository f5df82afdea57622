//! Environment-driven runtime tuning for the coroutine transport.
//!
//! `WARTHOG_STACK_SIZE` sets the stack size for request-serving coroutines,
//! in decimal or `0x` hex. Default is 16 KB; raise it for handlers with
//! deep call chains, lower it to pack more concurrent connections into the
//! same memory.

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default 0x4000).
    pub stack_size: usize,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let raw = env::var("WARTHOG_STACK_SIZE").ok();
        RuntimeConfig {
            stack_size: parse_stack_size(raw.as_deref()),
        }
    }
}

/// Unparsable values fall back to the default rather than failing startup.
fn parse_stack_size(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return DEFAULT_STACK_SIZE;
    };
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.unwrap_or(DEFAULT_STACK_SIZE)
}
