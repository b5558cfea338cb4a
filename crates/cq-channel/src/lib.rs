//! Sandbox-to-host console event channel with render-epoch fencing.

use cq_core::EditorError;
use cq_core::EditorResult;
use std::sync::mpsc;

const DEFAULT_MAX_TEXT_BYTES: usize = 16 * 1024;
const HARD_MAX_TEXT_BYTES: usize = 1024 * 1024;

/// Kind of console traffic forwarded from a preview sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Log,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Error => "error",
        }
    }

    pub fn from_tag(value: &str) -> Option<Self> {
        match value {
            "log" => Some(Self::Log),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Event emitted from inside a preview sandbox, tagged with the render
/// generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxEvent {
    pub epoch: u64,
    pub kind: EventKind,
    pub text: String,
}

/// Channel policy applied on the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub max_text_bytes: usize,
}

impl ChannelConfig {
    pub fn hardened() -> EditorResult<Self> {
        let config = Self {
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.max_text_bytes == 0 {
            return Err(EditorError::new(
                "channel.max_text_bytes_invalid",
                "channel max_text_bytes must be greater than zero",
            ));
        }

        if self.max_text_bytes > HARD_MAX_TEXT_BYTES {
            return Err(EditorError::new(
                "channel.max_text_bytes_too_large",
                "channel max_text_bytes exceeds hard limit (1 MiB)",
            ));
        }

        Ok(())
    }
}

/// Cloneable sender handed to a sandbox executor. Bound to the epoch that
/// was current when the render started.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<SandboxEvent>,
    epoch: u64,
}

impl EventEmitter {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn emit(&self, kind: EventKind, text: impl Into<String>) -> EditorResult<()> {
        self.tx
            .send(SandboxEvent {
                epoch: self.epoch,
                kind,
                text: text.into(),
            })
            .map_err(|error| {
                EditorError::new(
                    "channel.send_failed",
                    format!("failed to forward sandbox event: {error}"),
                )
            })
    }
}

/// Host side of the preview channel.
///
/// Each preview rebuild starts a new epoch; events still in flight from a
/// superseded sandbox are dropped on drain instead of landing in the console.
#[derive(Debug)]
pub struct PreviewChannel {
    tx: mpsc::Sender<SandboxEvent>,
    rx: mpsc::Receiver<SandboxEvent>,
    config: ChannelConfig,
    current_epoch: u64,
}

impl PreviewChannel {
    pub fn new(config: ChannelConfig) -> EditorResult<Self> {
        config.validate()?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            tx,
            rx,
            config,
            current_epoch: 0,
        })
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Starts a new preview generation and returns its epoch.
    pub fn begin_epoch(&mut self) -> u64 {
        self.current_epoch = self.current_epoch.saturating_add(1);
        self.current_epoch
    }

    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
            epoch: self.current_epoch,
        }
    }

    /// Drains pending events in arrival order, dropping any tagged with a
    /// superseded epoch and truncating oversized text.
    pub fn drain(&self) -> Vec<SandboxEvent> {
        let mut events = Vec::new();
        while let Ok(mut event) = self.rx.try_recv() {
            if event.epoch != self.current_epoch {
                continue;
            }

            truncate_to_bytes(&mut event.text, self.config.max_text_bytes);
            events.push(event);
        }
        events
    }
}

fn truncate_to_bytes(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }

    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(" [truncated]");
}

#[cfg(test)]
mod tests {
    use super::ChannelConfig;
    use super::EventKind;
    use super::PreviewChannel;

    fn channel() -> PreviewChannel {
        let config = ChannelConfig::hardened();
        assert!(config.is_ok());
        let channel = PreviewChannel::new(config.unwrap_or_else(|_| unreachable!()));
        assert!(channel.is_ok());
        channel.unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn config_rejects_zero_text_budget() {
        let config = ChannelConfig { max_text_bytes: 0 };
        let validated = config.validate();
        assert!(validated.is_err());
        if let Err(error) = validated {
            assert_eq!(error.code, "channel.max_text_bytes_invalid");
        }
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let mut channel = channel();
        channel.begin_epoch();
        let emitter = channel.emitter();

        let first = emitter.emit(EventKind::Log, "first");
        assert!(first.is_ok());
        let second = emitter.emit(EventKind::Error, "second");
        assert!(second.is_ok());

        let events = channel.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "first");
        assert_eq!(events[0].kind, EventKind::Log);
        assert_eq!(events[1].text, "second");
        assert_eq!(events[1].kind, EventKind::Error);
    }

    #[test]
    fn stale_epoch_events_are_dropped() {
        let mut channel = channel();
        channel.begin_epoch();
        let stale = channel.emitter();

        channel.begin_epoch();
        let live = channel.emitter();

        let _ = stale.emit(EventKind::Log, "from old preview");
        let _ = live.emit(EventKind::Log, "from live preview");

        let events = channel.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "from live preview");
        assert_eq!(events[0].epoch, channel.current_epoch());
    }

    #[test]
    fn oversized_text_is_truncated_at_char_boundary() {
        let config = ChannelConfig { max_text_bytes: 5 };
        let channel = PreviewChannel::new(config);
        assert!(channel.is_ok());
        let channel = channel.unwrap_or_else(|_| unreachable!());

        let emitter = channel.emitter();
        let _ = emitter.emit(EventKind::Log, "abc\u{20AC}xyz");

        let events = channel.drain();
        assert_eq!(events.len(), 1);
        assert!(events[0].text.starts_with("abc"));
        assert!(events[0].text.ends_with("[truncated]"));
    }

    #[test]
    fn kind_tag_roundtrip() {
        assert_eq!(EventKind::from_tag("log"), Some(EventKind::Log));
        assert_eq!(EventKind::from_tag("error"), Some(EventKind::Error));
        assert_eq!(EventKind::from_tag("warn"), None);
        assert_eq!(EventKind::Error.as_str(), "error");
    }
}
