// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Flattens a conversation's message tree into rendering order.

use std::collections::HashSet;

use crate::parser::{Conversation, Node, SYNTHETIC_ROOT_ID};

/// Returns the conversation's nodes in depth-first pre-order.
///
/// Traversal starts at the synthetic root if present, otherwise at the
/// first parentless node, otherwise at the first node of the mapping.
/// Children are visited in declared order. Children missing from the
/// mapping are skipped, and no node is emitted twice.
#[must_use]
pub fn linearize(conversation: &Conversation) -> Vec<&Node> {
    let Some(root) = root_id(conversation) else {
        return Vec::new();
    };

    let mut order = Vec::with_capacity(conversation.nodes().len());
    let mut visited = HashSet::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        let Some(node) = conversation.node(id) else {
            log::debug!(
                "conversation {}: skipping missing child {id}",
                conversation.id
            );
            continue;
        };
        if !visited.insert(id) {
            log::debug!("conversation {}: node {id} already visited", conversation.id);
            continue;
        }
        order.push(node);
        stack.extend(node.children.iter().rev().map(String::as_str));
    }

    order
}

fn root_id(conversation: &Conversation) -> Option<&str> {
    if conversation.node(SYNTHETIC_ROOT_ID).is_some() {
        return Some(SYNTHETIC_ROOT_ID);
    }
    let nodes = conversation.nodes();
    nodes
        .iter()
        .find(|node| node.parent.is_none())
        .or_else(|| nodes.first())
        .map(|node| node.id.as_str())
}
