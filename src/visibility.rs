// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Decides which messages appear in the rendered document.
//!
//! Exports contain plenty of messages the ChatGPT interface never shows:
//! hidden system context, reasoning end markers, and the JSON commands the
//! model sends to its browsing tools. The heuristics that recognize tool
//! commands live in [`is_tool_command`] and [`has_tool_signature`].

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::parser::{Message, ReasoningStatus, Role};

/// Top-level keys of JSON payloads the model sends to its tools.
const TOOL_COMMAND_KEYS: &[&str] = &[
    "open",
    "search_query",
    "find",
    "click",
    "browser",
    "code_interpreter",
];

static SEARCH_QUERY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""search_query"\s*:"#).expect("valid regex"));

static NAVIGATION_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[\s\S]*"(?:search_query|click|find)"\s*:"#).expect("valid regex")
});

static OPEN_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{[\s\S]*"open"\s*:"#).expect("valid regex"));

static URL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""url"\s*:"#).expect("valid regex"));

/// Returns `true` if the message should appear in the output.
#[must_use]
pub fn is_visible(message: &Message) -> bool {
    let metadata = &message.metadata;
    if metadata.is_visually_hidden || metadata.reasoning_status == ReasoningStatus::ReasoningEnded
    {
        return false;
    }

    match message.author.role {
        Role::System => message
            .raw_text()
            .is_some_and(|text| !text.trim().is_empty()),
        Role::Assistant => !message.raw_text().is_some_and(|text| is_tool_command(&text)),
        _ => true,
    }
}

/// Returns `true` if an assistant message's raw text is a tool command.
///
/// Matches a JSON object whose keys include a tool command key, or any text
/// carrying a `"search_query":` key even if it does not parse.
#[must_use]
pub fn is_tool_command(raw_text: &str) -> bool {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw_text.trim())
        && map.keys().any(|key| TOOL_COMMAND_KEYS.contains(&key.as_str()))
    {
        return true;
    }
    SEARCH_QUERY_KEY.is_match(raw_text)
}

/// Returns `true` if rendered text looks like an internal tool invocation.
///
/// Matches JSON-looking fragments with a `search_query`, `click` or `find`
/// key, or with both an `open` and a `url` key.
#[must_use]
pub fn has_tool_signature(text: &str) -> bool {
    NAVIGATION_KEY.is_match(text) || (OPEN_KEY.is_match(text) && URL_KEY.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Author, Metadata};
    use serde_json::json;

    fn message(role: Role, content: Value) -> Message {
        Message {
            author: Author { role, name: None },
            content: Some(content),
            metadata: Metadata::default(),
        }
    }

    fn text(role: Role, text: &str) -> Message {
        message(role, json!({ "content_type": "text", "parts": [text] }))
    }

    #[test]
    fn shows_ordinary_messages() {
        assert!(is_visible(&text(Role::User, "Hi")));
        assert!(is_visible(&text(Role::Assistant, "Hello!")));
        assert!(is_visible(&text(Role::Tool, "result")));
    }

    #[test]
    fn hides_visually_hidden_messages() {
        let mut msg = text(Role::User, "context");
        msg.metadata.is_visually_hidden = true;
        assert!(!is_visible(&msg));
    }

    #[test]
    fn hides_reasoning_ended_markers() {
        let mut msg = text(Role::Assistant, "done");
        msg.metadata.reasoning_status = ReasoningStatus::ReasoningEnded;
        assert!(!is_visible(&msg));
    }

    #[test]
    fn keeps_in_progress_reasoning() {
        let mut msg = text(Role::Assistant, "thinking");
        msg.metadata.reasoning_status = ReasoningStatus::IsReasoning;
        assert!(is_visible(&msg));
    }

    #[test]
    fn hides_blank_system_messages() {
        assert!(!is_visible(&text(Role::System, "  \n ")));
        assert!(!is_visible(&message(
            Role::System,
            json!({ "content_type": "user_editable_context" })
        )));
        assert!(is_visible(&text(Role::System, "You are helpful.")));
    }

    #[test]
    fn hides_assistant_search_command() {
        assert!(!is_visible(&text(Role::Assistant, r#"{"search_query": "x"}"#)));
    }

    #[test]
    fn hides_assistant_code_command() {
        let msg = message(
            Role::Assistant,
            json!({ "content_type": "code", "language": "unknown", "text": "{\"open\": \"turn0search1\"}" }),
        );
        assert!(!is_visible(&msg));
    }

    #[test]
    fn hides_unparseable_search_query() {
        assert!(!is_visible(&text(
            Role::Assistant,
            r#"search({"search_query": [{"q": "rust"}]"#
        )));
    }

    #[test]
    fn keeps_assistant_json_with_other_keys() {
        assert!(is_visible(&text(Role::Assistant, r#"{"answer": 42}"#)));
    }

    #[test]
    fn tool_command_keys_only_apply_to_assistant() {
        assert!(is_visible(&text(Role::User, r#"{"search_query": "x"}"#)));
    }

    #[test]
    fn detects_navigation_signatures() {
        assert!(has_tool_signature(r#"{"click": 3}"#));
        assert!(has_tool_signature("{\n  \"find\": \"pattern\"\n}"));
        assert!(has_tool_signature(r#"{"search_query": [{"q": "x"}]}"#));
    }

    #[test]
    fn open_requires_url() {
        assert!(has_tool_signature(r#"{"open": [{"ref_id": "x", "url": "https://a"}]}"#));
        assert!(!has_tool_signature(r#"{"open": "turn0"}"#));
    }

    #[test]
    fn ignores_prose_mentioning_keys() {
        assert!(!has_tool_signature("Use find to locate files, then click open."));
    }
}
