// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering for parsed ChatGPT conversations.
//!
//! This module turns a [`Conversation`] into a Markdown document with
//! front matter, suitable for note-taking tools such as Obsidian.
//!
//! # Output Format
//!
//! The rendered document contains, separated by blank lines:
//! - Front matter between `---` lines (timestamps, model, source link)
//! - A `# <title>` heading
//! - One section per visible message, in tree order
//!
//! User messages are indented, tool output is emitted bare, and all other
//! roles get a `## <role>` heading. Reasoning steps are grouped into
//! collapsible callouts (see [`crate::callout`]).
//!
//! # Example
//!
//! ```
//! use gpt2md::parser::parse_archive;
//! use gpt2md::renderer::{render_conversation, RenderOptions};
//!
//! let json = r#"[{
//!     "conversation_id": "abc",
//!     "title": "Greeting",
//!     "create_time": 1733356800.0,
//!     "mapping": {
//!         "m1": {
//!             "children": [],
//!             "message": {
//!                 "author": { "role": "assistant" },
//!                 "content": { "content_type": "text", "parts": ["Hi there!"] }
//!             }
//!         }
//!     }
//! }]"#;
//!
//! let archive = parse_archive(json).unwrap();
//! let markdown = render_conversation(&archive[0], &RenderOptions::default()).unwrap();
//!
//! assert!(markdown.starts_with("---\ncreated: 2024-12-05 00:00:00\n"));
//! assert!(markdown.contains("# Greeting"));
//! assert!(markdown.contains("## assistant\n\nHi there!"));
//! ```

use chrono::{DateTime, Utc};
use snafu::prelude::*;
use std::fmt;
use std::sync::Arc;

use crate::callout::{CalloutAssembler, Segment};
use crate::citations::{
    build_citation_map, extract_citations, extract_search_results, linkify_bare_urls,
    resolve_placeholders,
};
use crate::content::Content;
use crate::parser::{Author, Conversation, Message, Node, Role};
use crate::{tree, visibility};

/// Prefix of the link back to a conversation on chatgpt.com.
const SOURCE_URL: &str = "https://chatgpt.com/c/";

/// Front-matter timestamp format used when no override is configured.
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Title used for conversations without one.
const UNTITLED: &str = "Untitled";

/// Margin applied to user messages.
const USER_INDENT: &str = "    ";

/// Formats front-matter timestamps.
pub type DateFormatter = Arc<dyn Fn(DateTime<Utc>) -> String + Send + Sync>;

/// Error type for rendering failures.
#[derive(Debug, Snafu)]
pub enum RenderError {
    /// A message's content could not be decoded.
    #[snafu(display("failed to render node {node_id}: {source}\nnode data: {node}"))]
    Node {
        /// Identifier of the failing node.
        node_id: String,
        /// The node's full JSON, pretty-printed.
        node: String,
        /// The underlying decoding error.
        source: serde_json::Error,
    },
}

/// Configuration options for Markdown rendering.
#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Overrides how front-matter timestamps are formatted.
    ///
    /// Defaults to `YYYY-MM-DD HH:MM:SS` in UTC.
    pub date_format: Option<DateFormatter>,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("date_format", &self.date_format.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RenderOptions {
    fn format_date(&self, dt: DateTime<Utc>) -> String {
        match &self.date_format {
            Some(format) => format(dt),
            None => dt.format(DEFAULT_DATE_FORMAT).to_string(),
        }
    }
}

/// How a rendered message body is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    /// Apply the author's role formatting (indent, heading or none).
    Role,
    /// Return the body alone, for re-wrapping by the caller.
    Bare,
}

/// Renders a conversation as a complete Markdown document.
///
/// Every conversation yields a document, even one without visible messages.
///
/// # Errors
///
/// Returns an error if any message's content cannot be decoded. The error
/// carries the offending node.
pub fn render_conversation(
    conversation: &Conversation,
    opts: &RenderOptions,
) -> Result<String, RenderError> {
    let mut assembler = CalloutAssembler::new();
    for node in tree::linearize(conversation) {
        if let Some(segment) = render_node(node)? {
            assembler.push(segment);
        }
    }

    let mut sections = vec![front_matter(conversation, opts), title_line(conversation)];
    sections.extend(assembler.finish());

    Ok(format!("{}\n", sections.join("\n\n")))
}

/// Renders one node into a document segment.
///
/// Returns `None` for structural nodes, hidden messages and suppressed
/// content, whether or not the message is a reasoning step.
///
/// # Errors
///
/// Returns an error if the message content cannot be decoded.
pub fn render_node(node: &Node) -> Result<Option<Segment>, RenderError> {
    let Some(message) = &node.message else {
        return Ok(None);
    };
    if !visibility::is_visible(message) {
        return Ok(None);
    }

    if message.is_reasoning() {
        return Ok(render_message(node, message, Wrap::Bare)?.map(Segment::Reasoning));
    }

    Ok(render_message(node, message, Wrap::Role)?.map(Segment::Message))
}

/// Renders a message body, resolving citations and links.
///
/// Returns `None` if the message has no content, renders to blank text, or
/// looks like an internal tool invocation.
///
/// # Errors
///
/// Returns an error if the message content cannot be decoded.
pub fn render_message(
    node: &Node,
    message: &Message,
    wrap: Wrap,
) -> Result<Option<String>, RenderError> {
    let Some(raw) = &message.content else {
        return Ok(None);
    };

    let content = Content::from_value(raw).with_context(|_| NodeSnafu {
        node_id: node.id.clone(),
        node: serde_json::to_string_pretty(&node.raw).unwrap_or_else(|_| node.raw.to_string()),
    })?;

    let body = content.render();
    if body.trim().is_empty() {
        return Ok(None);
    }

    let metadata = &message.metadata;
    let citations = build_citation_map(metadata);
    let mut body = linkify_bare_urls(&resolve_placeholders(&body, &citations));

    for list in [extract_citations(metadata), extract_search_results(metadata)]
        .into_iter()
        .flatten()
    {
        body.push_str("\n\n");
        body.push_str(&list);
    }

    if visibility::has_tool_signature(&body) {
        log::debug!("node {}: suppressing tool invocation", node.id);
        return Ok(None);
    }
    if body.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(match wrap {
        Wrap::Role => wrap_for_role(&message.author, &body),
        Wrap::Bare => body,
    }))
}

fn wrap_for_role(author: &Author, body: &str) -> String {
    match author.role {
        Role::User => indent(body),
        Role::Tool => body.to_owned(),
        _ => {
            let role = author.role.as_str();
            match author.name.as_deref().filter(|name| !name.is_empty()) {
                Some(name) => format!("## {role} ({name})\n\n{body}"),
                None => format!("## {role}\n\n{body}"),
            }
        }
    }
}

/// Indents every non-blank line; blank lines become empty.
fn indent(body: &str) -> String {
    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{USER_INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn front_matter(conversation: &Conversation, opts: &RenderOptions) -> String {
    let timestamp = |epoch: Option<f64>| {
        epoch
            .and_then(datetime_from_epoch)
            .map(|dt| opts.format_date(dt))
            .unwrap_or_default()
    };

    let fields = [
        ("created", timestamp(conversation.create_time)),
        ("updated", timestamp(conversation.update_time)),
        ("tags", String::new()),
        ("aliases", String::new()),
        ("starred", "false".to_owned()),
        ("archived", "false".to_owned()),
        (
            "model",
            conversation.model_slug().unwrap_or_default().to_owned(),
        ),
        ("source", format!("{SOURCE_URL}{}", conversation.id)),
    ];

    let mut out = String::from("---\n");
    for (key, value) in fields {
        if value.is_empty() {
            out.push_str(&format!("{key}:\n"));
        } else {
            out.push_str(&format!("{key}: {value}\n"));
        }
    }
    out.push_str("---");
    out
}

/// Converts epoch seconds to a UTC timestamp, keeping microsecond precision.
#[must_use]
pub fn datetime_from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let micros = (epoch * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
}

fn title_line(conversation: &Conversation) -> String {
    let title = conversation
        .title
        .as_deref()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_owned());
    format!("# {}", fence_markup(&title))
}

/// Wraps XML/HTML-like tags in inline code so they render literally.
///
/// Only treats `<` as a tag start when followed by a letter, `/`, or `!`
/// to avoid false positives on comparisons like `x < 5`.
fn fence_markup(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    let mut chars = s.chars().peekable();
    let mut in_tag = false;

    while let Some(c) = chars.next() {
        if c == '<' && !in_tag {
            let is_tag_start = chars
                .peek()
                .is_some_and(|&next| next.is_ascii_alphabetic() || next == '/' || next == '!');
            if is_tag_start {
                result.push('`');
                in_tag = true;
            }
            result.push(c);
        } else if c == '>' && in_tag {
            result.push_str(">`");
            in_tag = false;
        } else {
            result.push(c);
        }
    }
    if in_tag {
        result.push('`');
    }

    result
}
