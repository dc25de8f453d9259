// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Typed message content and its Markdown rendering.
//!
//! Every message body carries a `content_type` tag. Known tags decode into a
//! [`Content`] variant; anything else is kept as [`Content::Unrecognized`]
//! and rendered as its raw JSON. Rendering here is a pure function of the
//! content: citation resolution and role wrapping happen in
//! [`crate::renderer`].

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::parser::get_str;

/// Language tag ChatGPT uses for code without a declared language.
const UNKNOWN_LANGUAGE: &str = "unknown";

/// Content kinds that decode into a typed [`Content`] variant.
const KNOWN_KINDS: &[&str] = &[
    "text",
    "code",
    "execution_output",
    "multimodal_text",
    "tether_browsing_display",
    "tether_quote",
    "system_error",
    "user_editable_context",
    "thoughts",
    "reasoning_recap",
    "sonic_webpage",
];

/// The body of a message, by content kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text split into parts.
    Text {
        /// Text parts, joined with newlines when rendered.
        #[serde(default)]
        parts: Vec<String>,
    },

    /// Code written by the model, usually a tool input.
    Code {
        /// Declared language; `"unknown"` means none.
        #[serde(default)]
        language: Option<String>,
        /// The code itself.
        #[serde(default, deserialize_with = "nullable_string")]
        text: String,
    },

    /// Captured output of executed code.
    ExecutionOutput {
        /// The raw captured text.
        #[serde(default, deserialize_with = "nullable_string")]
        text: String,
    },

    /// Text interleaved with images and other attachments.
    MultimodalText {
        /// The individual parts, in order.
        #[serde(default)]
        parts: Vec<MultimodalPart>,
    },

    /// Browsing tool results shown to the model.
    TetherBrowsingDisplay {
        /// Optional one-line summary.
        #[serde(default)]
        summary: Option<String>,
        /// The result text.
        #[serde(default, deserialize_with = "nullable_string")]
        result: String,
    },

    /// A quote taken from a browsed page.
    TetherQuote {
        /// Page URL.
        #[serde(default, deserialize_with = "nullable_string")]
        url: String,
        /// Page title, if known.
        #[serde(default)]
        title: Option<String>,
        /// The quoted text.
        #[serde(default, deserialize_with = "nullable_string")]
        text: String,
    },

    /// An error reported by the system.
    SystemError {
        /// Error name.
        #[serde(default, deserialize_with = "nullable_string")]
        name: String,
        /// Error description.
        #[serde(default, deserialize_with = "nullable_string")]
        text: String,
    },

    /// Custom instructions and profile; never rendered.
    UserEditableContext,

    /// Summarized reasoning steps.
    Thoughts {
        /// The individual thoughts.
        #[serde(default)]
        thoughts: Vec<Thought>,
    },

    /// A one-line recap of reasoning (e.g. "Thought for 12 seconds").
    ReasoningRecap {
        /// The recap text.
        #[serde(default, deserialize_with = "nullable_string")]
        content: String,
    },

    /// A snapshot of a web page.
    SonicWebpage {
        /// Page URL.
        #[serde(default, deserialize_with = "nullable_string")]
        url: String,
        /// Page title.
        #[serde(default, deserialize_with = "nullable_string")]
        title: String,
        /// Page text.
        #[serde(default, deserialize_with = "nullable_string")]
        text: String,
    },

    /// Any content kind outside the known set, kept verbatim.
    #[serde(skip_deserializing)]
    Unrecognized(Value),
}

/// One summarized reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Thought {
    /// Short heading for the step.
    #[serde(default, deserialize_with = "nullable_string")]
    pub summary: String,
    /// The step's text.
    #[serde(default, deserialize_with = "nullable_string")]
    pub content: String,
}

/// A part of a [`Content::MultimodalText`] body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultimodalPart {
    /// Plain text.
    Text(String),
    /// A pointer to an uploaded or generated image.
    Image {
        /// Width in pixels.
        width: u64,
        /// Height in pixels.
        height: u64,
        /// Generation prompt, for generated images.
        prompt: Option<String>,
    },
    /// Any other structured part, identified by its kind.
    Other(String),
}

impl<'de> Deserialize<'de> for MultimodalPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if let Some(text) = value.as_str() {
            return Ok(Self::Text(text.to_owned()));
        }

        let kind = get_str(&value, &["content_type"]).unwrap_or("unknown");
        if kind == "image_asset_pointer" {
            let dimension = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0);
            return Ok(Self::Image {
                width: dimension("width"),
                height: dimension("height"),
                prompt: get_str(&value, &["metadata", "dalle", "prompt"]).map(str::to_owned),
            });
        }

        Ok(Self::Other(kind.to_owned()))
    }
}

/// Deserializes a string that may be `null`.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Content {
    /// Decodes raw message content by its `content_type` tag.
    ///
    /// Unknown or missing tags yield [`Content::Unrecognized`].
    ///
    /// # Errors
    ///
    /// Returns an error if the content has a known tag but its fields do not
    /// have the expected shape.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        match get_str(value, &["content_type"]) {
            Some(kind) if KNOWN_KINDS.contains(&kind) => Self::deserialize(value),
            _ => Ok(Self::Unrecognized(value.clone())),
        }
    }

    /// Renders the content as Markdown.
    ///
    /// An empty result means the content produces no output.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text { parts } => parts.join("\n"),
            Self::Code { language, text } => {
                let lang = language
                    .as_deref()
                    .filter(|lang| *lang != UNKNOWN_LANGUAGE)
                    .unwrap_or_default();
                fenced(lang, text)
            }
            Self::ExecutionOutput { text } => fenced("", text),
            Self::MultimodalText { parts } => parts
                .iter()
                .map(render_part)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::TetherBrowsingDisplay { summary, result } => {
                let body = match summary.as_deref().filter(|s| !s.trim().is_empty()) {
                    Some(summary) => format!("{summary}\n{result}"),
                    None => result.clone(),
                };
                fenced("", &body)
            }
            Self::TetherQuote { url, title, text } => {
                let label = title
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(url);
                format!("> [{label}]({url})\n>\n{}", blockquote(text))
            }
            Self::SystemError { name, text } => format!("{name}\n\n{text}"),
            Self::UserEditableContext => String::new(),
            Self::Thoughts { thoughts } => thoughts
                .iter()
                .map(|t| format!("##### {}\n{}", t.summary, t.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
            Self::ReasoningRecap { content } => blockquote(content),
            Self::SonicWebpage { url, title, text } => {
                fenced("", &format!("{title} ({url})\n\n{text}"))
            }
            Self::Unrecognized(value) => value.to_string(),
        }
    }
}

fn render_part(part: &MultimodalPart) -> String {
    match part {
        MultimodalPart::Text(text) => text.clone(),
        MultimodalPart::Image {
            width,
            height,
            prompt,
        } => format!(
            "Image ({width}x{height}): {}",
            prompt.as_deref().unwrap_or_default()
        ),
        MultimodalPart::Other(kind) => format!("[{kind}]"),
    }
}

fn fenced(lang: &str, body: &str) -> String {
    format!("```{lang}\n{body}\n```")
}

/// Prefixes every line with a quote marker.
pub(crate) fn blockquote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_owned()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: &Value) -> String {
        Content::from_value(value).unwrap().render()
    }

    #[test]
    fn renders_text_parts_joined_by_newline() {
        let content = json!({ "content_type": "text", "parts": ["Hello", "world"] });
        assert_eq!(render(&content), "Hello\nworld");
    }

    #[test]
    fn renders_code_with_language() {
        let content = json!({ "content_type": "code", "language": "python", "text": "print(1)" });
        assert_eq!(render(&content), "```python\nprint(1)\n```");
    }

    #[test]
    fn renders_unknown_language_without_tag() {
        let content = json!({ "content_type": "code", "language": "unknown", "text": "x" });
        assert_eq!(render(&content), "```\nx\n```");
    }

    #[test]
    fn renders_missing_language_without_tag() {
        let content = json!({ "content_type": "code", "text": "x" });
        assert_eq!(render(&content), "```\nx\n```");
    }

    #[test]
    fn renders_execution_output_fenced() {
        let content = json!({ "content_type": "execution_output", "text": "42" });
        assert_eq!(render(&content), "```\n42\n```");
    }

    #[test]
    fn renders_multimodal_parts() {
        let content = json!({
            "content_type": "multimodal_text",
            "parts": [
                "Look at this",
                {
                    "content_type": "image_asset_pointer",
                    "asset_pointer": "file-service://abc",
                    "width": 1024,
                    "height": 768,
                    "metadata": { "dalle": { "prompt": "a cat" } }
                },
                { "content_type": "image_asset_pointer", "width": 10, "height": 20 },
                { "content_type": "audio_transcription", "text": "hi" }
            ]
        });

        assert_eq!(
            render(&content),
            "Look at this\nImage (1024x768): a cat\nImage (10x20): \n[audio_transcription]"
        );
    }

    #[test]
    fn renders_browsing_display_with_summary() {
        let content = json!({
            "content_type": "tether_browsing_display",
            "summary": "Searched",
            "result": "3 results"
        });
        assert_eq!(render(&content), "```\nSearched\n3 results\n```");
    }

    #[test]
    fn renders_browsing_display_without_summary() {
        let content = json!({
            "content_type": "tether_browsing_display",
            "summary": null,
            "result": "3 results"
        });
        assert_eq!(render(&content), "```\n3 results\n```");
    }

    #[test]
    fn renders_tether_quote() {
        let content = json!({
            "content_type": "tether_quote",
            "url": "https://example.com/page",
            "title": "Example",
            "text": "line one\nline two"
        });
        assert_eq!(
            render(&content),
            "> [Example](https://example.com/page)\n>\n> line one\n> line two"
        );
    }

    #[test]
    fn tether_quote_falls_back_to_url_label() {
        let content = json!({
            "content_type": "tether_quote",
            "url": "https://example.com",
            "title": "",
            "text": "quoted"
        });
        assert!(render(&content).starts_with("> [https://example.com](https://example.com)"));
    }

    #[test]
    fn renders_system_error() {
        let content = json!({ "content_type": "system_error", "name": "Timeout", "text": "took too long" });
        assert_eq!(render(&content), "Timeout\n\ntook too long");
    }

    #[test]
    fn suppresses_user_editable_context() {
        let content = json!({
            "content_type": "user_editable_context",
            "user_profile": "I like Rust",
            "user_instructions": "Be brief"
        });
        assert_eq!(render(&content), "");
    }

    #[test]
    fn renders_thoughts_as_headings() {
        let content = json!({
            "content_type": "thoughts",
            "thoughts": [
                { "summary": "Analysis", "content": "Looking closer" },
                { "summary": "Plan", "content": "Do it" }
            ]
        });
        assert_eq!(
            render(&content),
            "##### Analysis\nLooking closer\n\n##### Plan\nDo it"
        );
    }

    #[test]
    fn renders_reasoning_recap_as_quote() {
        let content = json!({ "content_type": "reasoning_recap", "content": "Thought for 5 seconds" });
        assert_eq!(render(&content), "> Thought for 5 seconds");
    }

    #[test]
    fn renders_sonic_webpage() {
        let content = json!({
            "content_type": "sonic_webpage",
            "url": "https://example.com",
            "title": "Example",
            "text": "Body"
        });
        assert_eq!(
            render(&content),
            "```\nExample (https://example.com)\n\nBody\n```"
        );
    }

    #[test]
    fn keeps_unknown_kind_verbatim() {
        let content = json!({ "content_type": "new_kind", "payload": 1 });
        let decoded = Content::from_value(&content).unwrap();

        assert_eq!(decoded, Content::Unrecognized(content.clone()));
        assert!(decoded.render().contains("new_kind"));
    }

    #[test]
    fn rejects_malformed_known_kind() {
        let content = json!({ "content_type": "text", "parts": "not a list" });
        assert!(Content::from_value(&content).is_err());
    }

    #[test]
    fn tolerates_null_text_fields() {
        let content = json!({ "content_type": "execution_output", "text": null });
        assert_eq!(render(&content), "```\n\n```");
    }

    #[test]
    fn rendering_is_repeatable() {
        let content = Content::from_value(&json!({ "content_type": "text", "parts": ["same"] })).unwrap();
        assert_eq!(content.render(), content.render());
    }
}
