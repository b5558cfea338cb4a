//! Advisory static analyzers for the three source buffers.
//!
//! Every check here is a heuristic: the HTML tag balance counts void
//! elements as unclosed, and braces inside CSS strings can skew the brace
//! balance. Results are surfaced alongside validation output and never gate
//! the scored result.

use boa_engine::Context;
use boa_engine::Source;

const PARSE_CHECK_LOOP_LIMIT: u64 = 10_000;

/// Heuristic issues for an HTML buffer.
pub fn lint_html(source: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if source.trim().is_empty() {
        issues.push("HTML is empty".to_owned());
        return issues;
    }

    let lower = source.to_ascii_lowercase();
    let opening = count_opening_tags(&lower);
    let closing = count_closing_tags(&lower);
    if opening != closing {
        issues.push(format!(
            "Possible unclosed tag: {opening} opening vs {closing} closing tags \
             (void elements like <br> and <img> are counted as opening)"
        ));
    }

    if let (Some(body), Some(head)) = (lower.find("<body"), lower.find("<head")) {
        if body < head {
            issues.push("<body> appears before <head>".to_owned());
        }
    }

    issues
}

/// Heuristic issues for a CSS buffer.
pub fn lint_css(source: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if source.trim().is_empty() {
        issues.push("CSS is empty".to_owned());
        return issues;
    }

    let opening = source.matches('{').count();
    let closing = source.matches('}').count();
    if opening != closing {
        issues.push(format!(
            "Unbalanced braces: {opening} opening vs {closing} closing \
             (braces inside strings are counted too)"
        ));
    }

    for (selector, body) in rule_blocks(source) {
        if let Some(line) = declaration_missing_semicolon(&body) {
            issues.push(format!(
                "Possible missing semicolon in `{selector}` near `{line}`"
            ));
        }
    }

    issues
}

/// Heuristic issues for a JS buffer.
pub fn lint_js(source: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if source.trim().is_empty() {
        issues.push("JavaScript is empty".to_owned());
        return issues;
    }

    if let Err(message) = parse_only(source) {
        issues.push(format!("Syntax error: {message}"));
    }

    if source.contains("var ") {
        issues.push("Consider let/const instead of var".to_owned());
    }

    issues
}

/// Construct-and-discard syntax check: the source is wrapped in a function
/// literal and evaluated in a throwaway context, so the body is parsed but
/// never run. The context is isolated; nothing inside it can reach the host.
fn parse_only(source: &str) -> Result<(), String> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(PARSE_CHECK_LOOP_LIMIT);

    let wrapped = format!("(function () {{\n{source}\n}});");
    context
        .eval(Source::from_bytes(wrapped.as_bytes()))
        .map(|_| ())
        .map_err(|error| error.to_string())
}

fn count_opening_tags(lower: &str) -> usize {
    let bytes = lower.as_bytes();
    let mut count = 0_usize;
    for (idx, byte) in bytes.iter().enumerate() {
        if *byte != b'<' {
            continue;
        }
        if bytes
            .get(idx + 1)
            .is_some_and(|next| next.is_ascii_alphabetic())
        {
            count += 1;
        }
    }
    count
}

fn count_closing_tags(lower: &str) -> usize {
    lower.matches("</").count()
}

/// Top-level `selector { body }` pairs, nesting-naive.
fn rule_blocks(source: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        let selector = rest[..open].trim().to_owned();
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };

        if !selector.is_empty() {
            blocks.push((selector, after[..close].to_owned()));
        }
        rest = &after[close + 1..];
    }

    blocks
}

/// First declaration-looking line inside a block body that lacks a trailing
/// semicolon. Best effort: multi-line values false-positive.
fn declaration_missing_semicolon(body: &str) -> Option<String> {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    for (idx, line) in lines.iter().enumerate() {
        if !line.contains(':') {
            continue;
        }

        // The final declaration before `}` may legally omit its semicolon.
        let is_last = idx + 1 == lines.len();
        if !line.ends_with(';') && !is_last {
            return Some((*line).to_owned());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::lint_css;
    use super::lint_html;
    use super::lint_js;

    #[test]
    fn empty_buffers_report_emptiness() {
        assert_eq!(lint_html("   "), vec!["HTML is empty".to_owned()]);
        assert_eq!(lint_css(""), vec!["CSS is empty".to_owned()]);
        assert_eq!(lint_js("\n\t"), vec!["JavaScript is empty".to_owned()]);
    }

    #[test]
    fn balanced_html_has_no_tag_issue() {
        let issues = lint_html("<div><p>hello</p></div>");
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn unclosed_tag_is_reported() {
        let issues = lint_html("<div><p>hello</div>");
        assert!(issues.iter().any(|issue| issue.contains("unclosed tag")));
    }

    #[test]
    fn void_elements_false_positive_is_documented_behavior() {
        // <br> has no closing tag, so the heuristic flags it.
        let issues = lint_html("<p>a<br>b</p>");
        assert!(issues.iter().any(|issue| issue.contains("unclosed tag")));
    }

    #[test]
    fn body_before_head_is_reported() {
        let issues = lint_html("<body></body><head></head>");
        assert!(
            issues
                .iter()
                .any(|issue| issue.contains("<body> appears before <head>"))
        );
    }

    #[test]
    fn unbalanced_braces_are_reported() {
        let issues = lint_css("h1 { color: red;");
        assert!(
            issues
                .iter()
                .any(|issue| issue.contains("Unbalanced braces"))
        );
    }

    #[test]
    fn missing_semicolon_between_declarations_is_reported() {
        let issues = lint_css("h1 {\n  color: red\n  margin: 0;\n}");
        assert!(
            issues
                .iter()
                .any(|issue| issue.contains("missing semicolon") && issue.contains("h1")),
            "issues: {issues:?}"
        );
    }

    #[test]
    fn final_declaration_may_omit_semicolon() {
        let issues = lint_css("h1 {\n  color: red;\n  margin: 0\n}");
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn valid_js_has_no_issues() {
        let issues = lint_js("const x = 1;\nconsole.log(x);");
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn syntax_error_is_reported_without_running_the_code() {
        let issues = lint_js("function broken( {");
        assert!(issues.iter().any(|issue| issue.contains("Syntax error")));
    }

    #[test]
    fn parse_check_does_not_execute_the_body() {
        // A body that would throw at runtime still parses cleanly.
        let issues = lint_js("(function () { throw new Error('never runs'); });");
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn var_usage_gets_a_style_suggestion() {
        let issues = lint_js("var x = 1;");
        assert!(issues.iter().any(|issue| issue.contains("let/const")));
    }
}
