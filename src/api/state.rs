//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::integration::Assistant;
use crate::telemetry::LogBuffer;

/// Shared application state.
///
/// All fields are cheap to clone across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    /// Recent log entries served by `GET /logs`.
    pub logs: LogBuffer,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>, logs: LogBuffer) -> Self {
        Self {
            assistant,
            logs,
            start_time: Instant::now(),
        }
    }
}
