//! Challenge rule tables and scored validation.
//!
//! Rules are static per `(category, challenge)` pair and run against the raw
//! source buffers. Each rule is fault-isolated: a panicking check is reported
//! as a failed rule and never stops the remaining rules.

use cq_buffers::SourceSet;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

/// Challenge category, keyed by the buffer the challenge focuses on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Html,
    Css,
    Js,
}

impl Category {
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
}

/// One named requirement check over the source buffers.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub check: fn(&SourceSet) -> bool,
    pub failure_message: &'static str,
}

/// A configured challenge: ordered rules plus the base XP it awards.
#[derive(Debug, Clone, Copy)]
pub struct Challenge {
    pub category: Category,
    pub id: &'static str,
    pub title: &'static str,
    pub xp_reward: u32,
    pub rules: &'static [Rule],
}

/// Outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Aggregated validation result. `xp_reward` is the base XP the caller may
/// award; this crate never mutates progression state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub passed: usize,
    pub total: usize,
    pub percentage: u32,
    pub is_valid: bool,
    pub xp_reward: u32,
    pub summary: String,
    pub rules: Vec<RuleOutcome>,
}

impl ValidationReport {
    /// Sentinel for an unconfigured `(category, challenge)` pair.
    pub fn not_found(category: Category, challenge_id: &str) -> Self {
        Self {
            passed: 0,
            total: 0,
            percentage: 0,
            is_valid: false,
            xp_reward: 0,
            summary: format!(
                "No validation rules configured for {}/{challenge_id}",
                category.as_str()
            ),
            rules: Vec::new(),
        }
    }
}

/// Runs every configured rule for the challenge and aggregates the result.
/// Unconfigured challenges short-circuit to the not-found sentinel.
pub fn validate(category: Category, challenge_id: &str, sources: &SourceSet) -> ValidationReport {
    let Some(challenge) = challenge_for(category, challenge_id) else {
        return ValidationReport::not_found(category, challenge_id);
    };

    let rules = evaluate(challenge.rules, sources);
    let passed = rules.iter().filter(|outcome| outcome.passed).count();
    let total = challenge.rules.len();
    let percentage = rounded_percentage(passed, total);
    let is_valid = total > 0 && passed == total;

    ValidationReport {
        passed,
        total,
        percentage,
        is_valid,
        xp_reward: challenge.xp_reward,
        summary: summarize(passed, total, percentage),
        rules,
    }
}

/// Evaluates an ordered rule list. A panicking check counts as failed with a
/// synthetic message and does not abort the remaining rules.
pub fn evaluate(rules: &[Rule], sources: &SourceSet) -> Vec<RuleOutcome> {
    rules
        .iter()
        .map(|rule| match catch_unwind(AssertUnwindSafe(|| (rule.check)(sources))) {
            Ok(true) => RuleOutcome {
                name: rule.name.to_owned(),
                passed: true,
                message: "Passed".to_owned(),
            },
            Ok(false) => RuleOutcome {
                name: rule.name.to_owned(),
                passed: false,
                message: rule.failure_message.to_owned(),
            },
            Err(payload) => RuleOutcome {
                name: rule.name.to_owned(),
                passed: false,
                message: format!("Validation error: {}", panic_text(payload.as_ref())),
            },
        })
        .collect()
}

pub fn challenge_for(category: Category, challenge_id: &str) -> Option<&'static Challenge> {
    CHALLENGES
        .iter()
        .find(|challenge| challenge.category == category && challenge.id == challenge_id)
}

pub fn challenges() -> &'static [Challenge] {
    &CHALLENGES
}

fn rounded_percentage(passed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }

    ((passed * 100 + total / 2) / total) as u32
}

fn summarize(passed: usize, total: usize, percentage: u32) -> String {
    if total > 0 && passed == total {
        "All requirements met".to_owned()
    } else {
        format!("{passed}/{total} requirements met ({percentage}%)")
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }

    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }

    "rule check panicked".to_owned()
}

// Rule table: Basic HTML Structure.

static HTML_BASIC_STRUCTURE: [Rule; 5] = [
    Rule {
        name: "doctype",
        check: has_doctype,
        failure_message: "Add a <!DOCTYPE html> declaration at the top of the document",
    },
    Rule {
        name: "html-lang",
        check: has_html_lang,
        failure_message: "Give the <html> tag a lang attribute",
    },
    Rule {
        name: "head",
        check: has_head,
        failure_message: "Add a <head> section",
    },
    Rule {
        name: "title",
        check: has_title,
        failure_message: "Add a <title> inside the head",
    },
    Rule {
        name: "body",
        check: has_body,
        failure_message: "Add a <body> section",
    },
];

fn has_doctype(sources: &SourceSet) -> bool {
    sources.html.to_ascii_lowercase().contains("<!doctype html")
}

fn has_html_lang(sources: &SourceSet) -> bool {
    open_tag_contains(&sources.html, "html", "lang=")
}

fn has_head(sources: &SourceSet) -> bool {
    sources.html.to_ascii_lowercase().contains("<head")
}

fn has_title(sources: &SourceSet) -> bool {
    sources.html.to_ascii_lowercase().contains("<title")
}

fn has_body(sources: &SourceSet) -> bool {
    sources.html.to_ascii_lowercase().contains("<body")
}

// Rule table: Basic CSS Selectors.

static CSS_BASIC_SELECTORS: [Rule; 5] = [
    Rule {
        name: "element-selector",
        check: has_element_selector,
        failure_message: "Style an element directly, e.g. h1 { ... }",
    },
    Rule {
        name: "class-selector",
        check: has_class_selector,
        failure_message: "Add a class selector, e.g. .card { ... }",
    },
    Rule {
        name: "id-selector",
        check: has_id_selector,
        failure_message: "Add an ID selector, e.g. #header { ... }",
    },
    Rule {
        name: "color-property",
        check: has_color_property,
        failure_message: "Set a color property on one of your rules",
    },
    Rule {
        name: "font-property",
        check: has_font_property,
        failure_message: "Set a font property (font-family or font-size)",
    },
];

fn has_element_selector(sources: &SourceSet) -> bool {
    css_selectors(&sources.css).iter().any(|selector| {
        selector
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_alphabetic())
    })
}

fn has_class_selector(sources: &SourceSet) -> bool {
    css_selectors(&sources.css)
        .iter()
        .any(|selector| selector.contains('.'))
}

fn has_id_selector(sources: &SourceSet) -> bool {
    css_selectors(&sources.css)
        .iter()
        .any(|selector| selector.contains('#'))
}

fn has_color_property(sources: &SourceSet) -> bool {
    squeeze(&sources.css).contains("color:")
}

fn has_font_property(sources: &SourceSet) -> bool {
    squeeze(&sources.css).contains("font-")
}

// Rule table: Basic Functions.

static JS_BASIC_FUNCTIONS: [Rule; 4] = [
    Rule {
        name: "declares-function",
        check: declares_function,
        failure_message: "Declare a function (function keyword or arrow syntax)",
    },
    Rule {
        name: "modern-declarations",
        check: uses_modern_declarations,
        failure_message: "Declare variables with let or const",
    },
    Rule {
        name: "logs-output",
        check: logs_output,
        failure_message: "Print something with console.log",
    },
    Rule {
        name: "returns-value",
        check: returns_value,
        failure_message: "Return a value from your function",
    },
];

fn declares_function(sources: &SourceSet) -> bool {
    sources.js.contains("function") || sources.js.contains("=>")
}

fn uses_modern_declarations(sources: &SourceSet) -> bool {
    sources.js.contains("let ") || sources.js.contains("const ")
}

fn logs_output(sources: &SourceSet) -> bool {
    sources.js.contains("console.log")
}

fn returns_value(sources: &SourceSet) -> bool {
    sources.js.contains("return")
}

static CHALLENGES: [Challenge; 3] = [
    Challenge {
        category: Category::Html,
        id: "basic-structure",
        title: "Basic HTML Structure",
        xp_reward: 50,
        rules: &HTML_BASIC_STRUCTURE,
    },
    Challenge {
        category: Category::Css,
        id: "basic-selectors",
        title: "Basic CSS Selectors",
        xp_reward: 50,
        rules: &CSS_BASIC_SELECTORS,
    },
    Challenge {
        category: Category::Js,
        id: "basic-functions",
        title: "Basic Functions",
        xp_reward: 75,
        rules: &JS_BASIC_FUNCTIONS,
    },
];

/// True when the first `<tag ...>` opening tag contains `needle` before its
/// closing `>`.
fn open_tag_contains(html: &str, tag: &str, needle: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let marker = format!("<{tag}");
    let Some(start) = lower.find(&marker) else {
        return false;
    };

    let end = lower[start..]
        .find('>')
        .map(|offset| start + offset)
        .unwrap_or(lower.len());
    lower[start..end].contains(needle)
}

/// Selector parts of top-level `selector { ... }` blocks. Best effort; used
/// only by rule checks, not by rendering.
fn css_selectors(css: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    for chunk in css.split('}') {
        if let Some((selector, _)) = chunk.split_once('{') {
            let trimmed = selector.trim();
            if !trimmed.is_empty() {
                selectors.push(trimmed.to_owned());
            }
        }
    }
    selectors
}

fn squeeze(input: &str) -> String {
    input
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}
