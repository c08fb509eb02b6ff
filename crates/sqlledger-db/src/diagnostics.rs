use std::sync::Arc;

use tracing::Level;

/// Receives leveled diagnostic messages from the engine.
///
/// The engine never writes to a global logger; everything it has to say goes
/// through the sink it was constructed with.
pub trait Diagnostics {
    fn emit(&self, level: Level, message: &str);
}

/// Discards every message. Used when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn emit(&self, _level: Level, _message: &str) {}
}

/// Forwards messages to the `tracing` subscriber installed by the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "sqlledger", "{message}"),
            Level::WARN => tracing::warn!(target: "sqlledger", "{message}"),
            Level::INFO => tracing::info!(target: "sqlledger", "{message}"),
            Level::DEBUG => tracing::debug!(target: "sqlledger", "{message}"),
            _ => tracing::trace!(target: "sqlledger", "{message}"),
        }
    }
}

impl<T: Diagnostics + ?Sized> Diagnostics for Arc<T> {
    fn emit(&self, level: Level, message: &str) {
        (**self).emit(level, message)
    }
}

impl<T: Diagnostics + ?Sized> Diagnostics for Box<T> {
    fn emit(&self, level: Level, message: &str) {
        (**self).emit(level, message)
    }
}
