// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert ChatGPT conversation exports to Markdown.
//!
//! This crate provides parsing and rendering functionality for transforming
//! the `conversations.json` file of a ChatGPT data export into one Markdown
//! document per conversation.
//!
//! # Overview
//!
//! ChatGPT stores each conversation as a tree of message nodes. This crate:
//!
//! 1. Parses the JSON archive into typed Rust representations
//! 2. Flattens each message tree into reading order
//! 3. Renders the visible messages as Markdown, grouping reasoning steps
//!    into collapsible callouts and resolving inline citations
//! 4. Writes each document under a sanitized file name with the
//!    conversation's original timestamps
//!
//! # Example
//!
//! ```no_run
//! use gpt2md::{output, parser, renderer};
//! use std::path::Path;
//!
//! let json = std::fs::read_to_string("conversations.json").unwrap();
//! let archive = parser::parse_archive(&json).unwrap();
//!
//! let opts = renderer::RenderOptions::default();
//! let mut namer = output::FileNamer::new();
//! for conversation in &archive {
//!     let markdown = renderer::render_conversation(conversation, &opts).unwrap();
//!     let path = Path::new("notes").join(namer.file_name(conversation));
//!     output::write_document(&path, &markdown, conversation).unwrap();
//! }
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing and type definitions for the export archive
//! - [`tree`]: message tree traversal
//! - [`visibility`]: which messages appear in the output
//! - [`content`]: per-kind rendering of message content
//! - [`citations`]: citation placeholders, link lists and bare URLs
//! - [`callout`]: grouping of reasoning steps into callouts
//! - [`renderer`]: message wrapping and document assembly
//! - [`output`]: file naming, writing and timestamp restoration

#![deny(missing_docs)]

pub mod callout;
pub mod citations;
pub mod content;
pub mod output;
pub mod parser;
pub mod renderer;
pub mod tree;
pub mod visibility;
