// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing for ChatGPT conversation archives.
//!
//! This module decodes the `conversations.json` file found in a ChatGPT data
//! export. The archive is an array of conversations; each conversation stores
//! its messages as a tree keyed by node identifier.
//!
//! # Format Overview
//!
//! A conversation contains:
//! - An identifier, a title and creation/update timestamps (epoch seconds)
//! - A `mapping` from node identifier to node
//! - Each node lists its parent, its children and optionally a message
//!
//! Decoding is lenient: missing or mistyped optional fields fall back to
//! defaults. Message content is kept as raw JSON and only decoded into its
//! typed form when it is rendered, so that a malformed message can be
//! reported together with the node that carries it.
//!
//! # Example
//!
//! ```
//! use gpt2md::parser::parse_archive;
//!
//! let json = r#"[{
//!     "conversation_id": "abc",
//!     "title": "Hello",
//!     "create_time": 1733356800.0,
//!     "update_time": 1733357400.0,
//!     "mapping": {
//!         "client-created-root": { "id": "client-created-root", "children": ["m1"] },
//!         "m1": {
//!             "id": "m1",
//!             "parent": "client-created-root",
//!             "children": [],
//!             "message": {
//!                 "author": { "role": "user" },
//!                 "content": { "content_type": "text", "parts": ["Hi"] }
//!             }
//!         }
//!     }
//! }]"#;
//!
//! let archive = parse_archive(json).unwrap();
//! assert_eq!(archive.len(), 1);
//! assert_eq!(archive[0].nodes().len(), 2);
//! ```

use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;
use std::collections::HashMap;

/// Error type for archive parsing failures.
///
/// These are input-shape errors: they abort the whole run before any
/// output is written.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },

    /// The archive root is not a JSON array.
    #[snafu(display("archive must be an array of conversations, found {found}"))]
    NotAnArray {
        /// The JSON type found at the root.
        found: &'static str,
    },

    /// An archive element is not a JSON object.
    #[snafu(display("archive element {index} is not a conversation object"))]
    NotAnObject {
        /// Position of the offending element in the archive.
        index: usize,
    },
}

/// Identifier of the synthetic root node ChatGPT inserts into each mapping.
pub const SYNTHETIC_ROOT_ID: &str = "client-created-root";

/// One exported chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// The conversation identifier (`conversation_id`, or `id` in older exports).
    pub id: String,

    /// The conversation title, if one was set.
    pub title: Option<String>,

    /// Creation time in epoch seconds.
    pub create_time: Option<f64>,

    /// Last update time in epoch seconds.
    pub update_time: Option<f64>,

    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Conversation {
    /// Creates a conversation from its nodes, kept in the given order.
    ///
    /// If two nodes share an identifier, lookups resolve to the first one.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: Option<String>,
        create_time: Option<f64>,
        update_time: Option<f64>,
        nodes: Vec<Node>,
    ) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(i);
        }
        Self {
            id: id.into(),
            title,
            create_time,
            update_time,
            nodes,
            index,
        }
    }

    /// All nodes of the mapping, in input order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Looks up a node by identifier.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Returns the first model identifier recorded on any message, in mapping order.
    #[must_use]
    pub fn model_slug(&self) -> Option<&str> {
        self.nodes
            .iter()
            .filter_map(|node| node.message.as_ref()?.metadata.model_slug.as_deref())
            .find(|slug| !slug.is_empty())
    }
}

/// One vertex of a conversation's message tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The node identifier (the mapping key).
    pub id: String,

    /// The parent node identifier, absent for roots.
    pub parent: Option<String>,

    /// Child node identifiers, in declared order.
    pub children: Vec<String>,

    /// The message carried by this node. Structural nodes have none.
    pub message: Option<Message>,

    /// The node's raw JSON, kept for error diagnostics.
    pub raw: Value,
}

/// A single message in the conversation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Who wrote the message.
    pub author: Author,

    /// The raw message content, tagged by `content_type`.
    ///
    /// Decoded into [`crate::content::Content`] at render time.
    pub content: Option<Value>,

    /// Recognized metadata fields.
    pub metadata: Metadata,
}

impl Message {
    /// Returns the content kind tag, if content is present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        get_str(self.content.as_ref()?, &["content_type"])
    }

    /// Returns the message's raw text: code text, or string parts joined by newline.
    ///
    /// Returns `None` when the content carries neither.
    #[must_use]
    pub fn raw_text(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        if let Some(text) = get_str(content, &["text"]) {
            return Some(text.to_owned());
        }
        let parts = content.get("parts")?.as_array()?;
        Some(
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Returns `true` if the message is an in-progress reasoning step.
    #[must_use]
    pub fn is_reasoning(&self) -> bool {
        self.metadata.reasoning_status == ReasoningStatus::IsReasoning
    }
}

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Author {
    /// The author's role.
    pub role: Role,

    /// Optional display name (e.g. a tool name such as `browser`).
    pub name: Option<String>,
}

/// The role tag of a message author.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Role {
    /// System prompt or instructions.
    System,
    /// The human participant.
    User,
    /// The model.
    #[default]
    Assistant,
    /// Output of a tool invoked by the model.
    Tool,
    /// Any role string outside the known set.
    Other(String),
}

impl Role {
    /// Returns the role name as it appears in the export.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Reasoning state of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReasoningStatus {
    /// No reasoning status recorded.
    #[default]
    Absent,
    /// The message is an in-progress reasoning step.
    IsReasoning,
    /// The message marks the end of reasoning.
    ReasoningEnded,
    /// Any other status value.
    Other(String),
}

impl From<&str> for ReasoningStatus {
    fn from(s: &str) -> Self {
        match s {
            "is_reasoning" => Self::IsReasoning,
            "reasoning_ended" => Self::ReasoningEnded,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// The message metadata keys the renderer reads. All other keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// `is_visually_hidden_from_conversation`.
    pub is_visually_hidden: bool,

    /// `reasoning_status`.
    pub reasoning_status: ReasoningStatus,

    /// `model_slug`, the model that produced the message.
    pub model_slug: Option<String>,

    /// `citations`, present only if the key exists.
    pub citations: Option<Vec<Citation>>,

    /// `search_result_groups`, present only if the key exists.
    pub search_result_groups: Option<Vec<SearchResultGroup>>,
}

/// A source cited by a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Citation {
    /// Identifier referenced by inline placeholder tokens.
    pub id: Option<String>,
    /// The cited URL.
    pub url: Option<String>,
    /// Display title (`title`, or `name`).
    pub title: Option<String>,
    /// Supplementary text (`detail`, `text` or `snippet`).
    pub detail: Option<String>,
}

/// A group of web search results, usually from one domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResultGroup {
    /// The domain the results came from.
    pub domain: Option<String>,
    /// The individual results.
    pub entries: Vec<SearchEntry>,
}

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchEntry {
    /// The result URL.
    pub url: Option<String>,
    /// The result title.
    pub title: Option<String>,
    /// A short excerpt of the page.
    pub snippet: Option<String>,
}

impl<'de> Deserialize<'de> for Conversation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let id = get_string(&value, &["conversation_id"])
            .or_else(|| get_string(&value, &["id"]))
            .unwrap_or_default();

        let nodes = value
            .get("mapping")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
            .map(|(key, node)| parse_node(key, node))
            .collect();

        Ok(Self::new(
            id,
            get_string(&value, &["title"]),
            value.get("create_time").and_then(Value::as_f64),
            value.get("update_time").and_then(Value::as_f64),
            nodes,
        ))
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let author = Author {
            role: get_str(&value, &["author", "role"])
                .map(Role::from)
                .unwrap_or_default(),
            name: get_string(&value, &["author", "name"]),
        };

        let content = value.get("content").filter(|c| !c.is_null()).cloned();

        let metadata = value
            .get("metadata")
            .map(extract_metadata)
            .unwrap_or_default();

        Ok(Self {
            author,
            content,
            metadata,
        })
    }
}

/// Builds a node from its mapping entry.
fn parse_node(key: &str, value: &Value) -> Node {
    let children = value
        .get("children")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect();

    let message = value
        .get("message")
        .filter(|m| m.is_object())
        .and_then(|m| serde_json::from_value(m.clone()).ok());

    Node {
        id: key.to_owned(),
        parent: get_string(value, &["parent"]),
        children,
        message,
        raw: value.clone(),
    }
}

/// Extracts the recognized metadata keys.
fn extract_metadata(value: &Value) -> Metadata {
    Metadata {
        is_visually_hidden: value
            .get("is_visually_hidden_from_conversation")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        reasoning_status: get_str(value, &["reasoning_status"])
            .map(ReasoningStatus::from)
            .unwrap_or_default(),
        model_slug: get_string(value, &["model_slug"]),
        citations: value
            .get("citations")
            .and_then(Value::as_array)
            .map(|list| list.iter().map(extract_citation).collect()),
        search_result_groups: value
            .get("search_result_groups")
            .and_then(Value::as_array)
            .map(|groups| groups.iter().map(extract_search_group).collect()),
    }
}

/// Extracts a citation, reading fields from the citation or its nested `metadata`.
fn extract_citation(value: &Value) -> Citation {
    let field = |keys: &[&str]| {
        keys.iter().find_map(|&key| {
            non_empty(get_str(value, &[key]))
                .or_else(|| non_empty(get_str(value, &["metadata", key])))
        })
    };

    let id = ["ref_id", "source_id", "id"]
        .iter()
        .find_map(|key| citation_id(value.get(*key)?));

    Citation {
        id,
        url: field(&["url"]),
        title: field(&["title", "name"]),
        detail: field(&["detail", "text", "snippet"]),
    }
}

/// Reads a citation identifier, composing structured `ref_id` objects into the
/// `turn{turn_index}{ref_type}{ref_index}` form used by placeholder tokens.
fn citation_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => {
            let turn = value.get("turn_index")?.as_u64()?;
            let kind = get_str(value, &["ref_type"])?;
            let index = value.get("ref_index")?.as_u64()?;
            Some(format!("turn{turn}{kind}{index}"))
        }
        _ => None,
    }
}

fn extract_search_group(value: &Value) -> SearchResultGroup {
    let entries = value
        .get("entries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|entry| SearchEntry {
            url: non_empty(get_str(entry, &["url"])),
            title: non_empty(get_str(entry, &["title"])),
            snippet: non_empty(get_str(entry, &["snippet"])),
        })
        .collect();

    SearchResultGroup {
        domain: get_string(value, &["domain"]),
        entries,
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty()).map(str::to_owned)
}

/// Navigates a JSON path and returns the string value at the end.
///
/// # Arguments
///
/// * `value` - The root JSON value to navigate from
/// * `path` - A sequence of keys to follow through the JSON structure
pub(crate) fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses a JSON string into the conversations of an archive.
///
/// This is the main entry point for parsing a ChatGPT export.
///
/// # Errors
///
/// Returns an error if the JSON is malformed, if the root is not an array,
/// or if any element of the array is not an object.
///
/// # Example
///
/// ```
/// use gpt2md::parser::parse_archive;
///
/// let archive = parse_archive("[]").unwrap();
/// assert!(archive.is_empty());
///
/// assert!(parse_archive(r#"{"title": "x"}"#).is_err());
/// ```
pub fn parse_archive(json_str: &str) -> Result<Vec<Conversation>, ParseError> {
    let value: Value = serde_json::from_str(json_str).context(JsonSnafu)?;
    parse_archive_value(value)
}

/// Decodes an already-parsed JSON value into the conversations of an archive.
///
/// # Errors
///
/// Returns an error if the value is not an array of objects.
pub fn parse_archive_value(value: Value) -> Result<Vec<Conversation>, ParseError> {
    let Value::Array(items) = value else {
        return NotAnArraySnafu {
            found: json_type_name(&value),
        }
        .fail();
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            ensure!(item.is_object(), NotAnObjectSnafu { index });
            serde_json::from_value(item).context(JsonSnafu)
        })
        .collect()
}
