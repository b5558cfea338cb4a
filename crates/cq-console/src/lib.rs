//! Console/output panel model and its HTML projection.
//!
//! The panel is a plain in-memory log; nothing here touches a live view.
//! Projections (`render_html`, the GUI shell) read the model and rebuild
//! their output from scratch.

use cq_channel::EventKind;
use std::collections::VecDeque;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

const DEFAULT_MAX_MESSAGES: usize = 500;
const CLEARED_MARKER: &str = "Console cleared";
const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// One retained console line. Text is stored already markup-escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub kind: EventKind,
    pub text: String,
    pub timestamp_millis: u64,
}

/// Status indicator derived from the retained messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Ready,
    Errors(usize),
}

/// Bounded append-only console log.
///
/// Retains at most `max_messages` lines; the oldest line is evicted first
/// once the bound is reached.
#[derive(Debug, Clone)]
pub struct ConsolePanel {
    messages: VecDeque<ConsoleMessage>,
    max_messages: usize,
}

impl Default for ConsolePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePanel {
    pub fn new() -> Self {
        Self::bounded(DEFAULT_MAX_MESSAGES)
    }

    pub fn bounded(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// Appends a message stamped with the current wall clock. The text is
    /// escaped so message content is never interpreted as markup.
    pub fn append(&mut self, kind: EventKind, text: &str) {
        self.append_at(kind, text, now_millis());
    }

    pub fn append_at(&mut self, kind: EventKind, text: &str, timestamp_millis: u64) {
        while self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }

        self.messages.push_back(ConsoleMessage {
            kind,
            text: escape_markup(text),
            timestamp_millis,
        });
    }

    /// Empties the panel, leaving a single marker line, and resets the
    /// status indicator to `Ready`.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.append(EventKind::Log, CLEARED_MARKER);
    }

    pub fn messages(&self) -> impl Iterator<Item = &ConsoleMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Error count derived by re-scanning the retained messages.
    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.kind == EventKind::Error)
            .count()
    }

    pub fn status(&self) -> PanelStatus {
        match self.error_count() {
            0 => PanelStatus::Ready,
            errors => PanelStatus::Errors(errors),
        }
    }

    /// Pure model-to-markup projection of the whole panel.
    pub fn render_html(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(&format!(
                "<div class=\"console-line console-{}\">[{}] {}</div>\n",
                message.kind.as_str(),
                format_clock(message.timestamp_millis),
                message.text
            ));
        }
        out
    }
}

/// Escapes `<`, `>` and `"` so appended text renders literally.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Formats a UTC wall-clock `HH:MM:SS` prefix from epoch milliseconds.
pub fn format_clock(timestamp_millis: u64) -> String {
    let seconds_of_day = (timestamp_millis % MILLIS_PER_DAY) / 1000;
    let hours = seconds_of_day / 3600;
    let minutes = (seconds_of_day / 60) % 60;
    let seconds = seconds_of_day % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
