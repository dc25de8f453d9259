// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Groups reasoning messages into collapsible callouts.
//!
//! Consecutive reasoning messages become one outer callout titled
//! "Reasoning", with one nested callout per message:
//!
//! ```text
//! > [!note]- Reasoning
//! > > [!note]- Analysis
//! > > First step
//! >
//! > > [!note]- Links
//! > > [Source](https://example.com)
//! ```
//!
//! The nested title comes from the message's leading level-5 heading, or is
//! "Links" when the message is nothing but links.

use regex::Regex;
use std::sync::LazyLock;

const OUTER_HEADER: &str = "> [!note]- Reasoning";
const NESTED_PREFIX: &str = "> >";
const SIBLING_SEPARATOR: &str = ">";
const DEFAULT_TITLE: &str = "Reasoning";
const LINKS_TITLE: &str = "Links";

static LINK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+]\s+)?\[[^\]]*\]\(https?://[^)\s]*\)$").expect("valid regex")
});

static TITLE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#####\s+(\S.*)$").expect("valid regex"));

/// A rendered message, tagged by where it belongs in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An in-progress reasoning step; the body carries no role header.
    Reasoning(String),
    /// Any other message, already wrapped for its role.
    Message(String),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    InCallout(Vec<String>),
}

/// Assembles a conversation's rendered segments into document sections.
///
/// Create one per conversation: state never carries over between documents.
#[derive(Debug, Default)]
pub struct CalloutAssembler {
    state: State,
    sections: Vec<String>,
}

impl CalloutAssembler {
    /// Creates an assembler with no open callout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the next segment in document order.
    pub fn push(&mut self, segment: Segment) {
        match segment {
            Segment::Reasoning(body) => self.push_reasoning(&body),
            Segment::Message(text) => {
                self.close();
                self.sections.push(text);
            }
        }
    }

    /// Closes any open callout and returns the document sections.
    ///
    /// Sections are meant to be joined with blank lines; the blank line
    /// after a callout is what ends it.
    #[must_use]
    pub fn finish(mut self) -> Vec<String> {
        self.close();
        self.sections
    }

    fn push_reasoning(&mut self, body: &str) {
        let mut lines = match std::mem::take(&mut self.state) {
            State::Idle => vec![OUTER_HEADER.to_owned()],
            State::InCallout(mut lines) => {
                lines.push(SIBLING_SEPARATOR.to_owned());
                lines
            }
        };

        let block = NestedBlock::classify(body);
        lines.push(format!("{NESTED_PREFIX} [!note]- {}", block.title));
        lines.extend(block.lines.iter().map(|line| {
            if line.trim().is_empty() {
                NESTED_PREFIX.to_owned()
            } else {
                format!("{NESTED_PREFIX} {line}")
            }
        }));

        self.state = State::InCallout(lines);
    }

    fn close(&mut self) {
        if let State::InCallout(lines) = std::mem::take(&mut self.state) {
            self.sections.push(lines.join("\n"));
        }
    }
}

/// The title and unquoted body of one nested callout.
#[derive(Debug, PartialEq, Eq)]
struct NestedBlock<'a> {
    title: String,
    lines: Vec<&'a str>,
}

impl<'a> NestedBlock<'a> {
    fn classify(body: &'a str) -> Self {
        let lines: Vec<&str> = body.lines().map(strip_quote_markers).collect();

        let content: Vec<&str> = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| is_content_line(line))
            .collect();
        if !content.is_empty() && content.iter().all(|line| LINK_LINE.is_match(line)) {
            return Self {
                title: LINKS_TITLE.to_owned(),
                lines: content,
            };
        }

        let heading = lines
            .iter()
            .position(|line| !line.trim().is_empty())
            .and_then(|i| {
                let caps = TITLE_HEADING.captures(lines[i].trim())?;
                Some((i, caps[1].trim().to_owned()))
            });

        let (title, rest) = match heading {
            Some((i, title)) => (title, &lines[i + 1..]),
            None => (DEFAULT_TITLE.to_owned(), &lines[..]),
        };

        Self {
            title,
            lines: trim_blank_lines(rest).to_vec(),
        }
    }
}

/// Removes leading quote markers (`>`, `> >`, ...) from a line.
fn strip_quote_markers(mut line: &str) -> &str {
    while let Some(rest) = line.trim_start().strip_prefix('>') {
        line = rest.strip_prefix(' ').unwrap_or(rest);
    }
    line
}

/// Lines that count towards link-only classification: not blank, not a
/// code fence, not a heading and not a callout marker.
fn is_content_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with("```") && !line.starts_with('#') && !line.starts_with("[!")
}

fn trim_blank_lines<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(start, |i| i + 1);
    &lines[start..end]
}
