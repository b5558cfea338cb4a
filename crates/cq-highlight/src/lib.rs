//! Syntax highlighting overlay and line-number gutter model.
//!
//! Recomputed synchronously from the raw buffer text on every edit; the
//! overlay and gutter are read-only projections that share one scroll
//! offset so they stay aligned with the editable buffer.

use cq_buffers::BufferKind;

const JS_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "delete", "do", "else",
    "false", "finally", "for", "function", "if", "in", "instanceof", "let", "new", "null",
    "of", "return", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var",
    "while",
];

/// Classification used by the overlay projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Markup,
    StringLit,
    Comment,
    Keyword,
    Number,
    Symbol,
}

impl TokenKind {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Text => "tok-text",
            Self::Markup => "tok-markup",
            Self::StringLit => "tok-string",
            Self::Comment => "tok-comment",
            Self::Keyword => "tok-keyword",
            Self::Number => "tok-number",
            Self::Symbol => "tok-symbol",
        }
    }
}

/// One highlighted run of text; never spans a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

/// Derived highlight data for a single buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightState {
    pub kind: BufferKind,
    pub lines: Vec<Vec<Token>>,
    scroll_x: f32,
    scroll_y: f32,
}

impl HighlightState {
    pub fn compute(kind: BufferKind, text: &str) -> Self {
        let lines = match kind {
            BufferKind::Html => tokenize_html(text),
            BufferKind::Css => tokenize_css(text),
            BufferKind::Js => tokenize_js(text),
        };

        Self {
            kind,
            lines,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Gutter numbers `1..=line_count`.
    pub fn gutter(&self) -> Vec<u32> {
        (1..=self.lines.len() as u32).collect()
    }

    /// Applies the editable buffer's scroll offsets to the overlay and the
    /// gutter together.
    pub fn set_scroll(&mut self, x: f32, y: f32) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    pub fn overlay_scroll(&self) -> (f32, f32) {
        (self.scroll_x, self.scroll_y)
    }

    /// The gutter follows the vertical offset only.
    pub fn gutter_scroll(&self) -> f32 {
        self.scroll_y
    }
}

struct LineSink {
    lines: Vec<Vec<Token>>,
    current: Vec<Token>,
}

impl LineSink {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: Vec::new(),
        }
    }

    fn push(&mut self, kind: TokenKind, ch: char) {
        if ch == '\n' {
            self.newline();
            return;
        }

        if let Some(last) = self.current.last_mut() {
            if last.kind == kind {
                last.text.push(ch);
                return;
            }
        }

        self.current.push(Token {
            kind,
            text: ch.to_string(),
        });
    }

    fn push_str(&mut self, kind: TokenKind, text: &str) {
        for ch in text.chars() {
            self.push(kind, ch);
        }
    }

    fn newline(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn finish(mut self) -> Vec<Vec<Token>> {
        self.lines.push(self.current);
        self.lines
    }
}

fn tokenize_html(text: &str) -> Vec<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut sink = LineSink::new();
    let mut idx = 0_usize;
    let mut in_comment = false;
    let mut in_tag = false;
    let mut quote: Option<char> = None;

    while idx < chars.len() {
        let ch = chars[idx];

        if in_comment {
            sink.push(TokenKind::Comment, ch);
            if ch == '>' && idx >= 2 && chars[idx - 1] == '-' && chars[idx - 2] == '-' {
                in_comment = false;
            }
            idx += 1;
            continue;
        }

        if in_tag {
            if let Some(open) = quote {
                sink.push(TokenKind::StringLit, ch);
                if ch == open {
                    quote = None;
                }
                idx += 1;
                continue;
            }

            match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    sink.push(TokenKind::StringLit, ch);
                }
                '>' => {
                    in_tag = false;
                    sink.push(TokenKind::Markup, ch);
                }
                _ => sink.push(TokenKind::Markup, ch),
            }
            idx += 1;
            continue;
        }

        if ch == '<' {
            if starts_with_at(&chars, idx, "<!--") {
                in_comment = true;
                sink.push(TokenKind::Comment, ch);
            } else {
                in_tag = true;
                sink.push(TokenKind::Markup, ch);
            }
            idx += 1;
            continue;
        }

        sink.push(TokenKind::Text, ch);
        idx += 1;
    }

    sink.finish()
}

fn tokenize_css(text: &str) -> Vec<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut sink = LineSink::new();
    let mut idx = 0_usize;
    let mut in_comment = false;
    let mut quote: Option<char> = None;

    while idx < chars.len() {
        let ch = chars[idx];
        let next = chars.get(idx + 1).copied();

        if in_comment {
            sink.push(TokenKind::Comment, ch);
            if ch == '/' && idx >= 1 && chars[idx - 1] == '*' {
                in_comment = false;
            }
            idx += 1;
            continue;
        }

        if let Some(open) = quote {
            sink.push(TokenKind::StringLit, ch);
            if ch == open {
                quote = None;
            }
            idx += 1;
            continue;
        }

        if ch == '/' && next == Some('*') {
            in_comment = true;
            sink.push(TokenKind::Comment, ch);
            idx += 1;
            continue;
        }

        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            sink.push(TokenKind::StringLit, ch);
            idx += 1;
            continue;
        }

        if ch.is_ascii_digit() {
            let (number, consumed) = read_number(&chars, idx);
            sink.push_str(TokenKind::Number, &number);
            idx += consumed;
            continue;
        }

        if matches!(ch, '{' | '}' | ':' | ';' | ',' | '(' | ')' | '.' | '#' | '@') {
            sink.push(TokenKind::Symbol, ch);
            idx += 1;
            continue;
        }

        sink.push(TokenKind::Text, ch);
        idx += 1;
    }

    sink.finish()
}

fn tokenize_js(text: &str) -> Vec<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut sink = LineSink::new();
    let mut idx = 0_usize;

    while idx < chars.len() {
        let ch = chars[idx];
        let next = chars.get(idx + 1).copied();

        if ch == '/' && next == Some('/') {
            while idx < chars.len() && chars[idx] != '\n' {
                sink.push(TokenKind::Comment, chars[idx]);
                idx += 1;
            }
            continue;
        }

        if ch == '/' && next == Some('*') {
            sink.push(TokenKind::Comment, ch);
            sink.push(TokenKind::Comment, '*');
            idx += 2;
            while idx < chars.len() {
                let inner = chars[idx];
                sink.push(TokenKind::Comment, inner);
                if inner == '/' && chars[idx - 1] == '*' {
                    idx += 1;
                    break;
                }
                idx += 1;
            }
            continue;
        }

        if ch == '\'' || ch == '"' || ch == '`' {
            let open = ch;
            sink.push(TokenKind::StringLit, ch);
            idx += 1;
            let mut escaped = false;
            while idx < chars.len() {
                let inner = chars[idx];
                sink.push(TokenKind::StringLit, inner);
                idx += 1;
                if escaped {
                    escaped = false;
                    continue;
                }
                if inner == '\\' {
                    escaped = true;
                    continue;
                }
                if inner == open {
                    break;
                }
            }
            continue;
        }

        if ch.is_ascii_digit() {
            let (number, consumed) = read_number(&chars, idx);
            sink.push_str(TokenKind::Number, &number);
            idx += consumed;
            continue;
        }

        if is_ident_start(ch) {
            let (word, consumed) = read_identifier(&chars, idx);
            let kind = if JS_KEYWORDS.contains(&word.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Text
            };
            sink.push_str(kind, &word);
            idx += consumed;
            continue;
        }

        if ch.is_whitespace() {
            sink.push(TokenKind::Text, ch);
            idx += 1;
            continue;
        }

        sink.push(TokenKind::Symbol, ch);
        idx += 1;
    }

    sink.finish()
}

fn read_number(chars: &[char], start: usize) -> (String, usize) {
    let mut out = String::new();
    let mut idx = start;
    while idx < chars.len() && (chars[idx].is_ascii_digit() || chars[idx] == '.') {
        out.push(chars[idx]);
        idx += 1;
    }
    (out, idx - start)
}

fn read_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut out = String::new();
    let mut idx = start;
    while idx < chars.len() && is_ident_char(chars[idx]) {
        out.push(chars[idx]);
        idx += 1;
    }
    (out, idx - start)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

fn starts_with_at(chars: &[char], idx: usize, pattern: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let end = idx.saturating_add(pattern.len());
    end <= chars.len() && chars[idx..end] == pattern[..]
}

#[cfg(test)]
mod tests {
    use super::HighlightState;
    use super::TokenKind;
    use cq_buffers::BufferKind;

    fn kinds_on_line(state: &HighlightState, line: usize) -> Vec<TokenKind> {
        state.lines[line].iter().map(|token| token.kind).collect()
    }

    #[test]
    fn line_count_matches_newline_split() {
        for text in ["", "one", "one\ntwo", "one\ntwo\n", "\n\n"] {
            let state = HighlightState::compute(BufferKind::Js, text);
            assert_eq!(state.line_count(), text.split('\n').count(), "text {text:?}");
        }
    }

    #[test]
    fn gutter_runs_from_one_to_line_count() {
        let state = HighlightState::compute(BufferKind::Html, "a\nb\nc");
        assert_eq!(state.gutter(), vec![1, 2, 3]);
    }

    #[test]
    fn js_keywords_are_classified() {
        let state = HighlightState::compute(BufferKind::Js, "const x = 42;");
        let kinds = kinds_on_line(&state, 0);
        assert!(kinds.contains(&TokenKind::Keyword));
        assert!(kinds.contains(&TokenKind::Number));
        assert!(kinds.contains(&TokenKind::Symbol));
    }

    #[test]
    fn html_comment_spans_lines() {
        let state = HighlightState::compute(BufferKind::Html, "<!-- a\nb -->\n<p>x</p>");
        assert_eq!(state.line_count(), 3);
        assert!(
            state.lines[1]
                .iter()
                .all(|token| token.kind == TokenKind::Comment)
        );
        assert!(
            state.lines[2]
                .iter()
                .any(|token| token.kind == TokenKind::Markup)
        );
    }

    #[test]
    fn html_attribute_strings_are_classified() {
        let state = HighlightState::compute(BufferKind::Html, "<html lang=\"en\">");
        let kinds = kinds_on_line(&state, 0);
        assert!(kinds.contains(&TokenKind::StringLit));
        assert!(kinds.contains(&TokenKind::Markup));
    }

    #[test]
    fn css_symbols_and_numbers_are_classified() {
        let state = HighlightState::compute(BufferKind::Css, "h1 { margin: 8px; }");
        let kinds = kinds_on_line(&state, 0);
        assert!(kinds.contains(&TokenKind::Symbol));
        assert!(kinds.contains(&TokenKind::Number));
    }

    #[test]
    fn js_line_comment_stops_at_newline() {
        let state = HighlightState::compute(BufferKind::Js, "// note\nlet x = 1;");
        assert!(
            state.lines[0]
                .iter()
                .all(|token| token.kind == TokenKind::Comment)
        );
        assert!(
            state.lines[1]
                .iter()
                .any(|token| token.kind == TokenKind::Keyword)
        );
    }

    #[test]
    fn scroll_applies_to_overlay_and_gutter_together() {
        let mut state = HighlightState::compute(BufferKind::Css, "a { b: c; }");
        state.set_scroll(12.5, 80.0);
        assert_eq!(state.overlay_scroll(), (12.5, 80.0));
        assert_eq!(state.gutter_scroll(), 80.0);
    }

    #[test]
    fn tokens_rebuild_line_text_losslessly() {
        let text = "function greet(name) {\n  return \"hi \" + name; // done\n}";
        let state = HighlightState::compute(BufferKind::Js, text);
        let rebuilt: Vec<String> = state
            .lines
            .iter()
            .map(|line| {
                line.iter()
                    .map(|token| token.text.as_str())
                    .collect::<String>()
            })
            .collect();
        let expected: Vec<String> = text.split('\n').map(str::to_owned).collect();
        assert_eq!(rebuilt, expected);
    }
}
