//! Error reporting seam
//!
//! Transient fetch and persistence failures are recovered locally but still
//! handed to an [`ErrorReporter`] so they reach whatever diagnostics backend
//! the deployment wires in. The default implementation writes through the
//! structured logger; tests substitute a recording reporter.

use crate::error::GridwatchError;
use crate::logging::{StructuredLogger, get_logger};
use std::sync::Arc;

/// Sink for recovered-but-noteworthy errors
pub trait ErrorReporter: Send + Sync {
    /// Capture an error raised by the named component
    fn capture(&self, component: &str, error: &GridwatchError);
}

/// Reporter that writes captures through the structured logger
pub struct LogReporter {
    logger: StructuredLogger,
}

impl LogReporter {
    pub fn new() -> Self {
        Self {
            logger: get_logger("report"),
        }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter for LogReporter {
    fn capture(&self, component: &str, error: &GridwatchError) {
        self.logger
            .error(&format!("captured from {}: {}", component, error));
    }
}

/// Shared handle to the default log-backed reporter
pub fn log_reporter() -> Arc<dyn ErrorReporter> {
    Arc::new(LogReporter::new())
}
