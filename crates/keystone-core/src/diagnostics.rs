//! Diagnostic channel with pre-logging buffering.
//!
//! During bootstrap the broker has to report notices and errors before any
//! logging service exists. [`Diagnostics`] starts in buffering mode and keeps
//! entries in order; [`Diagnostics::enable`] flips it to live mode exactly
//! once, flushing the buffer through the given sink and routing every later
//! entry straight to it.
//!
//! The buffer is bounded: past [`DEFAULT_BUFFER_LIMIT`] entries the oldest are
//! dropped and the flush starts with a notice counting them. Buffered entries
//! are also mirrored at `trace` level under the `keystone::diagnostics`
//! target.
//!
//! A broker used outside the service runtime stays in buffering mode until
//! the host calls `enable`:
//!
//! ```rust,ignore
//! let broker = ServiceBroker::new(factories);
//! broker.diagnostics().enable(Arc::new(TracingSink));
//! ```

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, trace};

use crate::error::error_chain;

/// Destination for broker diagnostics once logging is available.
pub trait DiagnosticSink: Send + Sync {
    fn notice(&self, message: &str);
    fn error(&self, message: &str);
}

/// Routes diagnostics through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn notice(&self, message: &str) {
        info!(target: "keystone::diagnostics", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "keystone::diagnostics", "{message}");
    }
}

/// Raw stderr sink, the fallback when no logging service came up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn notice(&self, message: &str) {
        eprintln!("[keystone] notice: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("[keystone] error: {message}");
    }
}

/// One buffered diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Notice(String),
    Error(String),
}

impl Diagnostic {
    fn emit(&self, sink: &dyn DiagnosticSink) {
        match self {
            Self::Notice(message) => sink.notice(message),
            Self::Error(message) => sink.error(message),
        }
    }
}

/// Entries kept before a sink is enabled.
pub const DEFAULT_BUFFER_LIMIT: usize = 1024;

struct Buffer {
    entries: VecDeque<Diagnostic>,
    limit: usize,
    dropped: usize,
}

impl Buffer {
    fn push(&mut self, entry: Diagnostic) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
            self.dropped += 1;
        }
        if self.limit > 0 {
            self.entries.push_back(entry);
        } else {
            self.dropped += 1;
        }
    }
}

enum Mode {
    Buffering(Buffer),
    Live(Arc<dyn DiagnosticSink>),
}

/// Broker-owned diagnostic channel.
pub struct Diagnostics {
    mode: Mutex<Mode>,
}

impl Diagnostics {
    /// Creates a channel in buffering mode.
    pub fn new() -> Self {
        Self::with_buffer_limit(DEFAULT_BUFFER_LIMIT)
    }

    /// Creates a channel that buffers at most `limit` entries.
    pub fn with_buffer_limit(limit: usize) -> Self {
        Self {
            mode: Mutex::new(Mode::Buffering(Buffer {
                entries: VecDeque::new(),
                limit,
                dropped: 0,
            })),
        }
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.record(Diagnostic::Notice(message.into()));
    }

    /// Reports an error together with its whole cause chain.
    pub fn error(&self, err: &(dyn StdError + 'static)) {
        self.record(Diagnostic::Error(error_chain(err)));
    }

    pub fn error_message(&self, message: impl Into<String>) {
        self.record(Diagnostic::Error(message.into()));
    }

    fn record(&self, entry: Diagnostic) {
        let sink = {
            let mut mode = self.mode.lock();
            match &mut *mode {
                Mode::Buffering(buffer) => {
                    trace!(target: "keystone::diagnostics", buffered = true, "{entry:?}");
                    buffer.push(entry);
                    return;
                }
                Mode::Live(sink) => Arc::clone(sink),
            }
        };
        entry.emit(sink.as_ref());
    }

    /// Switches to live mode, flushing buffered entries through `sink` in order.
    ///
    /// Returns `false` (and ignores `sink`) when the channel is already live.
    pub fn enable(&self, sink: Arc<dyn DiagnosticSink>) -> bool {
        let mut mode = self.mode.lock();
        let (buffered, dropped) = match &mut *mode {
            Mode::Live(_) => return false,
            Mode::Buffering(buffer) => (std::mem::take(&mut buffer.entries), buffer.dropped),
        };
        // Flushed under the lock so entries recorded concurrently land after the buffer.
        if dropped > 0 {
            sink.notice(&format!("{dropped} earlier diagnostics were dropped"));
        }
        for entry in &buffered {
            entry.emit(sink.as_ref());
        }
        *mode = Mode::Live(sink);
        true
    }

    pub fn is_live(&self) -> bool {
        matches!(*self.mode.lock(), Mode::Live(_))
    }

    /// Snapshot of the entries still waiting for a sink.
    pub fn buffered(&self) -> Vec<Diagnostic> {
        match &*self.mode.lock() {
            Mode::Buffering(buffer) => buffer.entries.iter().cloned().collect(),
            Mode::Live(_) => Vec::new(),
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.mode.lock() {
            Mode::Buffering(buffer) => f
                .debug_struct("Diagnostics")
                .field("buffered", &buffer.entries.len())
                .field("dropped", &buffer.dropped)
                .finish(),
            Mode::Live(_) => f.debug_struct("Diagnostics").field("live", &true).finish(),
        }
    }
}

/// Sink that keeps everything it receives, for hosts and tests that want to
/// inspect what the broker reported.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| match entry {
                Diagnostic::Error(message) => Some(message.clone()),
                Diagnostic::Notice(_) => None,
            })
            .collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn notice(&self, message: &str) {
        self.entries.lock().push(Diagnostic::Notice(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.entries.lock().push(Diagnostic::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_flushed_in_order() {
        let diagnostics = Diagnostics::new();
        diagnostics.notice("first");
        diagnostics.error_message("second");
        assert_eq!(diagnostics.buffered().len(), 2);

        let sink = Arc::new(CollectingSink::new());
        assert!(diagnostics.enable(sink.clone()));
        diagnostics.notice("third");

        assert_eq!(
            sink.entries(),
            vec![
                Diagnostic::Notice("first".into()),
                Diagnostic::Error("second".into()),
                Diagnostic::Notice("third".into()),
            ]
        );
        assert!(diagnostics.buffered().is_empty());
    }

    #[test]
    fn test_enable_happens_once() {
        let diagnostics = Diagnostics::new();
        let first = Arc::new(CollectingSink::new());
        let second = Arc::new(CollectingSink::new());

        assert!(diagnostics.enable(first.clone()));
        assert!(!diagnostics.enable(second.clone()));
        diagnostics.notice("routed");

        assert_eq!(first.entries().len(), 1);
        assert!(second.entries().is_empty());
        assert!(diagnostics.is_live());
    }

    #[test]
    fn test_buffer_drops_oldest_past_limit() {
        let diagnostics = Diagnostics::with_buffer_limit(2);
        for message in ["one", "two", "three", "four"] {
            diagnostics.notice(message);
        }
        assert_eq!(
            diagnostics.buffered(),
            vec![
                Diagnostic::Notice("three".into()),
                Diagnostic::Notice("four".into()),
            ]
        );

        let sink = Arc::new(CollectingSink::new());
        diagnostics.enable(sink.clone());
        assert_eq!(
            sink.entries(),
            vec![
                Diagnostic::Notice("2 earlier diagnostics were dropped".into()),
                Diagnostic::Notice("three".into()),
                Diagnostic::Notice("four".into()),
            ]
        );
    }

    #[test]
    fn test_error_renders_cause_chain() {
        let diagnostics = Diagnostics::new();
        let err = std::io::Error::other("disk gone");
        diagnostics.error(&err);
        assert_eq!(
            diagnostics.buffered(),
            vec![Diagnostic::Error("disk gone".into())]
        );
    }
}
