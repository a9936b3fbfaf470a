//! Line-oriented output for harness messages.
//!
//! Every line the harness prints goes through a `Reporter`. Lines may embed
//! paired color tags such as `<red>…</red>`; the reporter never interprets
//! them. Rendering is left to whoever owns the `OutputSink`.

use std::sync::{Arc, Mutex, PoisonError};

/// Destination for rendered harness lines.
pub trait OutputSink: Send + Sync {
    /// Write one line. `line` never contains a trailing newline.
    fn emit(&self, line: &str);
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line emitted so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// True if any emitted line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|l| l.contains(needle))
    }
}

impl OutputSink for BufferSink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Formats harness messages and hands them to a sink.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn OutputSink>,
}

impl Reporter {
    pub const PASS: &'static str = "<green>PASS</green>";
    pub const FAIL: &'static str = "<red>FAIL</red>";
    pub const SKIP: &'static str = "<yellow>SKIP</yellow>";
    pub const INFO: &'static str = "<blue>INFO</blue>";
    pub const DEBUG: &'static str = "<magenta>DEBUG</magenta>";
    pub const NOTE: &'static str = "<blue>NOTE</blue>";

    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self { sink }
    }

    /// Emit `text` as-is. Multi-line text is split so sinks see one line per call.
    pub fn text(&self, text: &str) {
        for line in text.split('\n') {
            self.sink.emit(line);
        }
    }

    /// Emit `[prefix] text`.
    pub fn prefixed(&self, prefix: &str, text: &str) {
        self.text(&format!("[{prefix}] {text}"));
    }

    pub fn info(&self, text: &str) {
        self.prefixed(Self::INFO, text);
    }

    pub fn debug(&self, text: &str) {
        self.prefixed(Self::DEBUG, text);
    }

    pub fn note(&self, text: &str) {
        self.prefixed(Self::NOTE, text);
    }

    /// Emit `count` separator lines; `new_line(1)` emits one empty line.
    pub fn new_line(&self, count: usize) {
        for _ in 0..count.max(1) {
            self.sink.emit("");
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_lines_wrap_the_prefix_in_brackets() {
        let sink = BufferSink::new();
        let reporter = Reporter::new(Arc::new(sink.clone()));

        reporter.info("hello");
        reporter.debug("world");
        reporter.note("<red>x</red>");

        assert_eq!(
            sink.lines(),
            vec![
                "[<blue>INFO</blue>] hello".to_string(),
                "[<magenta>DEBUG</magenta>] world".to_string(),
                "[<blue>NOTE</blue>] <red>x</red>".to_string(),
            ]
        );
    }

    #[test]
    fn multi_line_text_is_split() {
        let sink = BufferSink::new();
        let reporter = Reporter::new(Arc::new(sink.clone()));
        reporter.text("a\nb");
        reporter.new_line(2);
        assert_eq!(sink.lines(), vec!["a", "b", "", ""]);
    }
}
