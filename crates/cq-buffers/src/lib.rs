//! Editable source buffer model.

/// The three languages an editing session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Html,
    Css,
    Js,
}

impl BufferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "html" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" => Some(Self::Js),
            _ => None,
        }
    }

    pub const ALL: [Self; 3] = [Self::Html, Self::Css, Self::Js];
}

/// The three mutable source buffers owned by an editing session.
///
/// Buffers carry no history; loads and resets overwrite wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl SourceSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: BufferKind) -> &str {
        match kind {
            BufferKind::Html => &self.html,
            BufferKind::Css => &self.css,
            BufferKind::Js => &self.js,
        }
    }

    pub fn set(&mut self, kind: BufferKind, text: impl Into<String>) {
        match kind {
            BufferKind::Html => self.html = text.into(),
            BufferKind::Css => self.css = text.into(),
            BufferKind::Js => self.js = text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.js.is_empty()
    }
}
