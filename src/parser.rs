//! Recovers `(path, content)` file records from free-form model output.
//!
//! Models are asked to answer with `<file path="...">...</file>` blocks but
//! drift from that format in small ways: single quotes, stray whitespace
//! inside the tag, a closing tag that never arrives. [`parse`] tries a
//! cascade of [`ParseStrategy`] variants, most strict first, and stops at
//! the first one that yields anything.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::model::FileRecord;

/// One way of reading file blocks out of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseStrategy {
    /// `<file path="p">...</file>` with a double-quoted path.
    StrictTag,
    /// As strict, but the path may use single or double quotes.
    LooseQuote,
    /// Whitespace allowed around `=`, before `>` and inside the closing tag.
    WhitespaceTolerant,
    /// Line scanner that accepts a missing or broken closing tag.
    LineStateMachine,
}

impl ParseStrategy {
    /// Strategies in the order they are attempted.
    pub const CASCADE: [Self; 4] =
        [Self::StrictTag, Self::LooseQuote, Self::WhitespaceTolerant, Self::LineStateMachine];

    fn block_pattern(self) -> Option<&'static Regex> {
        static STRICT: OnceLock<Option<Regex>> = OnceLock::new();
        static LOOSE: OnceLock<Option<Regex>> = OnceLock::new();
        static SPACED: OnceLock<Option<Regex>> = OnceLock::new();
        let (cell, pattern) = match self {
            Self::StrictTag => (&STRICT, r#"(?s)<file\s+path="(.*?)">(.*?)</file>"#),
            Self::LooseQuote => (&LOOSE, r#"(?s)<file\s+path=['"]([^'"]+)['"]>(.*?)</file>"#),
            Self::WhitespaceTolerant => {
                (&SPACED, r#"(?s)<file\s+path\s*=\s*['"]([^'"]+)['"]\s*>(.*?)</file\s*>"#)
            }
            Self::LineStateMachine => return None,
        };
        cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
    }
}

/// Files recovered from a response and the strategy that found them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Recovered files, first occurrence of each path only.
    pub files: Vec<FileRecord>,
    /// Strategy that produced `files`; `None` when nothing was recovered.
    pub strategy: Option<ParseStrategy>,
}

/// Extracts file records from `text`. Never fails; returns an empty list
/// when nothing is recoverable.
#[must_use]
pub fn parse(text: &str) -> Vec<FileRecord> {
    parse_with_strategy(text).files
}

/// Like [`parse`], also reporting which strategy succeeded.
#[must_use]
pub fn parse_with_strategy(text: &str) -> ParseOutcome {
    for strategy in ParseStrategy::CASCADE {
        let files = match strategy.block_pattern() {
            Some(pattern) => parse_blocks(pattern, text),
            None if strategy == ParseStrategy::LineStateMachine => parse_lines(text),
            None => continue,
        };
        if !files.is_empty() {
            if strategy == ParseStrategy::LineStateMachine {
                tracing::warn!(files = files.len(), "recovered files with line state machine");
            }
            return ParseOutcome { files, strategy: Some(strategy) };
        }
    }
    ParseOutcome::default()
}

/// Collects records while discarding repeated paths.
#[derive(Default)]
struct Collector {
    files: Vec<FileRecord>,
    seen: HashSet<String>,
}

impl Collector {
    fn push(&mut self, path: &str, raw: &str) {
        let path = path.trim();
        if path.is_empty() || !self.seen.insert(path.to_string()) {
            return;
        }
        self.files.push(FileRecord::new(path, clean_content(raw)));
    }
}

fn parse_blocks(pattern: &Regex, text: &str) -> Vec<FileRecord> {
    let mut out = Collector::default();
    for caps in pattern.captures_iter(text) {
        out.push(&caps[1], &caps[2]);
    }
    out.files
}

fn opening_tag() -> Option<&'static Regex> {
    static OPEN: OnceLock<Option<Regex>> = OnceLock::new();
    OPEN.get_or_init(|| Regex::new(r#"^\s*<file\s+path\s*=\s*["']([^"']+)["']"#).ok()).as_ref()
}

fn parse_lines(text: &str) -> Vec<FileRecord> {
    let Some(open) = opening_tag() else {
        return Vec::new();
    };
    let mut out = Collector::default();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if let Some(caps) = open.captures(line) {
            if let Some((path, body)) = current.take() {
                if !body.is_empty() {
                    out.push(&path, &body.join("\n"));
                }
            }
            let path = caps[1].to_string();
            let rest = &line[caps.get(0).map_or(0, |m| m.end())..];
            let after_tag = rest.find('>').map_or("", |idx| &rest[idx + 1..]).trim_start();
            if let Some((inline, _)) = after_tag.split_once("</file") {
                out.push(&path, inline);
                continue;
            }
            let mut body = Vec::new();
            if !after_tag.trim().is_empty() {
                body.push(after_tag.trim_end().to_string());
            }
            current = Some((path, body));
            continue;
        }

        if let Some((path, mut body)) = current.take() {
            if let Some((before, _)) = line.split_once("</file") {
                if !before.trim().is_empty() {
                    body.push(before.trim_end().to_string());
                }
                out.push(&path, &body.join("\n"));
            } else {
                body.push(line.to_string());
                current = Some((path, body));
            }
        }
    }

    if let Some((path, body)) = current {
        if !body.is_empty() {
            out.push(&path, &body.join("\n"));
        }
    }
    out.files
}

/// Trims content and strips one wrapping markdown fence.
fn clean_content(raw: &str) -> String {
    let mut content = raw.trim();
    if content.starts_with("```") {
        if let Some(newline) = content.find('\n') {
            let marker = &content[3..newline];
            if marker.chars().all(|c| c.is_alphanumeric() || c == '_') {
                content = &content[newline + 1..];
            }
        }
    }
    let trimmed_end = content.trim_end();
    if let Some(body) = trimmed_end.strip_suffix("```") {
        if let Some(stripped) = body.strip_suffix('\n') {
            content = stripped;
        }
    }
    content.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(files: &[FileRecord]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn strict_tags_round_trip() {
        let text = "Here you go:\n\
            <file path=\"backend/main.py\">\nprint('hi')\n</file>\n\
            <file path=\"frontend/index.html\">\n<h1>Hi</h1>\n</file>\n\
            <file path=\"README.md\">\n# Title\n\nBody\n</file>\n";
        let outcome = parse_with_strategy(text);
        assert_eq!(outcome.strategy, Some(ParseStrategy::StrictTag));
        assert_eq!(
            paths(&outcome.files),
            vec!["backend/main.py", "frontend/index.html", "README.md"]
        );
        assert_eq!(outcome.files[0].content, "print('hi')");
        assert_eq!(outcome.files[1].content, "<h1>Hi</h1>");
        assert_eq!(outcome.files[2].content, "# Title\n\nBody");
    }

    #[test]
    fn strips_inner_markdown_fence() {
        let text = "<file path=\"app.js\">\n```javascript\nconst x = 1;\n```\n</file>";
        let files = parse(text);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "const x = 1;");
    }

    #[test]
    fn first_duplicate_wins() {
        let text = "<file path=\"a.py\">first</file>\n<file path=\"a.py\">second</file>";
        let files = parse(text);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.py");
        assert_eq!(files[0].content, "first");
    }

    #[test]
    fn single_quotes_use_loose_strategy() {
        let text = "<file path='server.js'>\nconsole.log(1)\n</file>";
        let outcome = parse_with_strategy(text);
        assert_eq!(outcome.strategy, Some(ParseStrategy::LooseQuote));
        assert_eq!(outcome.files[0].content, "console.log(1)");
    }

    #[test]
    fn whitespace_inside_tags_is_tolerated() {
        let text = "<file  path = \"x.py\" >\nx = 1\n</file >";
        let outcome = parse_with_strategy(text);
        assert_eq!(outcome.strategy, Some(ParseStrategy::WhitespaceTolerant));
        assert_eq!(paths(&outcome.files), vec!["x.py"]);
        assert_eq!(outcome.files[0].content, "x = 1");
    }

    #[test]
    fn state_machine_recovers_broken_closing_tags() {
        let text = "<file path=\"a.py\">\nprint('a')\n</file\n\
            <file path='b.js'>\nconsole.log('b')\n  </file\n\
            <file path=\"c.py\">\nprint('c')\n";
        let outcome = parse_with_strategy(text);
        assert_eq!(outcome.strategy, Some(ParseStrategy::LineStateMachine));
        assert_eq!(paths(&outcome.files), vec!["a.py", "b.js", "c.py"]);
        assert_eq!(outcome.files[0].content, "print('a')");
        assert_eq!(outcome.files[1].content, "console.log('b')");
        assert_eq!(outcome.files[2].content, "print('c')");
    }

    #[test]
    fn state_machine_keeps_content_before_closing_fragment() {
        let text = "<file path=\"a.txt\">\nline one\nline two</file\n";
        let files = parse(text);
        assert_eq!(files[0].content, "line one\nline two");
    }

    #[test]
    fn nothing_recoverable_yields_empty() {
        let outcome = parse_with_strategy("Sorry, I cannot help with that.");
        assert!(outcome.files.is_empty());
        assert!(outcome.strategy.is_none());
    }
}
