//! Logger collaborator used by the reward dispatcher's failure path, plus
//! helpers for keeping user-supplied text on a single log line.

use log::{error, warn};

use crate::mission::storage::MissionStore;

/// Sink for isolated failures: a short title, the error message and a full trace.
pub trait ErrorLogger: Send + Sync {
    fn error(&self, title: &str, message: &str, trace: &str);
}

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Anything past `MAX_PREVIEW` characters is cut and replaced by an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    escape_with_limit(s, Some(MAX_PREVIEW))
}

/// Same escaping as [`escape_log`] without the preview cut, for traces.
pub fn escape_log_full(s: &str) -> String {
    escape_with_limit(s, None)
}

fn escape_with_limit(s: &str, limit: Option<usize>) -> String {
    let mut out = String::with_capacity(s.len().min(limit.unwrap_or(usize::MAX)) + 8);
    for (count, ch) in s.chars().enumerate() {
        if limit.is_some_and(|max| count >= max) {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Full trace of an error: its `Debug` form followed by every `source()` in the chain.
pub fn error_trace(err: &(dyn std::error::Error + 'static)) -> String {
    let mut trace = format!("{:?}", err);
    let mut source = err.source();
    let mut depth = 1;
    while let Some(cause) = source {
        trace.push_str(&format!("\n  caused by ({}): {}", depth, cause));
        source = cause.source();
        depth += 1;
    }
    trace
}

/// Writes through the `log` facade and keeps the full trace in the store's log tree.
pub struct StoreErrorLogger {
    store: MissionStore,
}

impl StoreErrorLogger {
    pub fn new(store: MissionStore) -> Self {
        Self { store }
    }
}

impl ErrorLogger for StoreErrorLogger {
    fn error(&self, title: &str, message: &str, trace: &str) {
        let trace = escape_log_full(trace);
        error!("{}: {} | {}", escape_log(title), escape_log(message), trace);
        let line = format!("{} | {} | {}", title, message, trace);
        if let Err(e) = self.store.append_log(&line) {
            warn!("could not persist error log entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::errors::MissionError;
    use crate::mission::storage::MissionStoreBuilder;
    use tempfile::TempDir;

    #[test]
    fn escapes_newlines_and_truncates() {
        assert_eq!(escape_log("Line1\nLine2\r\tEnd"), "Line1\\nLine2\\r\\tEnd");
        let long = "a".repeat(400);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), 301);
    }

    #[test]
    fn trace_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = MissionError::from(io);
        let trace = error_trace(&err);
        assert!(trace.starts_with("Io("));
        assert!(trace.contains("caused by (1): disk gone"));
    }

    #[test]
    fn store_logger_persists_entries() {
        let dir = TempDir::new().unwrap();
        let store = MissionStoreBuilder::new(dir.path()).open().unwrap();
        let logger = StoreErrorLogger::new(store.clone());
        logger.error("Reward failed", "boom", "Internal(\"boom\")\nline two");
        let logs = store.list_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].starts_with("Reward failed | boom | "));
        assert!(logs[0].contains("\\nline two"));
    }

    #[test]
    fn store_logger_keeps_long_traces_whole() {
        let dir = TempDir::new().unwrap();
        let store = MissionStoreBuilder::new(dir.path()).open().unwrap();
        let logger = StoreErrorLogger::new(store.clone());
        let trace = format!("{}\n  caused by (1): END_OF_TRACE", "x".repeat(400));
        logger.error("Reward failed", "boom", &trace);
        let logs = store.list_logs().unwrap();
        assert!(logs[0].ends_with("\\n  caused by (1): END_OF_TRACE"));
        assert!(!logs[0].contains('…'));
        assert_eq!(escape_log_full(&"y".repeat(500)).len(), 500);
    }
}
