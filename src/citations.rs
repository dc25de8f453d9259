// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Citation and link handling.
//!
//! ChatGPT marks inline citations with private-use sentinel characters:
//! `U+E200 cite U+E202 <id> U+E201`. This module resolves those tokens
//! against the message's citation metadata, turns bare URLs into Markdown
//! links, and renders the citation and search-result lists appended after
//! a message body.

use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::parser::Metadata;

/// Separates the marker from the identifiers, and identifiers from each other.
const CITE_SEPARATOR: char = '\u{E202}';

/// Matches a citation placeholder token, capturing its identifiers.
static CITE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E200}cite\u{E202}([^\u{E201}]*)\u{E201}").expect("valid regex")
});

/// Matches spans to keep verbatim (Markdown links, autolinks, inline code)
/// or a bare URL to convert. URLs may contain balanced parentheses but stop
/// at quotes.
static LINK_OR_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[[^\]\n]*\]\((?:[^()\s]|\([^()\s]*\))*\)",
        r"|<https?://[^>\s]+>",
        r"|`[^`\n]*`",
        r#"|https?://(?:[^\s<>()\[\]`"']|\([^\s<>()\[\]`"']*\))+"#,
    ))
    .expect("valid regex")
});

/// Maps citation identifiers to rendered Markdown links.
pub type CitationMap = HashMap<String, String>;

/// Formats a Markdown link.
#[must_use]
pub fn markdown_link(label: &str, url: &str) -> String {
    format!("[{label}]({url})")
}

/// Picks a link label: the title if it is not blank, else the last path
/// segment of the URL.
fn link_label<'a>(title: Option<&'a str>, url: &'a str) -> &'a str {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(url)
}

/// Builds the identifier-to-link lookup for a message's citations.
///
/// Citations without an identifier or URL are skipped. If an identifier
/// repeats, the first citation wins.
#[must_use]
pub fn build_citation_map(metadata: &Metadata) -> CitationMap {
    let mut map = CitationMap::new();
    for citation in metadata.citations.iter().flatten() {
        let (Some(id), Some(url)) = (&citation.id, &citation.url) else {
            continue;
        };
        map.entry(id.clone())
            .or_insert_with(|| markdown_link(link_label(citation.title.as_deref(), url), url));
    }
    map
}

/// Replaces citation placeholder tokens with their resolved links.
///
/// Unresolved identifiers render as nothing. A token naming several
/// identifiers renders their links separated by spaces.
#[must_use]
pub fn resolve_placeholders(text: &str, citations: &CitationMap) -> String {
    CITE_TOKEN
        .replace_all(text, |caps: &Captures<'_>| {
            caps[1]
                .split(CITE_SEPARATOR)
                .filter_map(|id| citations.get(id.trim()))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .into_owned()
}

/// Renders the message's citations as a link-per-line list.
///
/// Returns `None` when no citation has a URL. Repeated URLs are listed once.
#[must_use]
pub fn extract_citations(metadata: &Metadata) -> Option<String> {
    let mut seen = HashSet::new();
    let lines: Vec<String> = metadata
        .citations
        .iter()
        .flatten()
        .filter_map(|citation| {
            let url = citation.url.as_deref()?;
            seen.insert(url)
                .then(|| markdown_link(link_label(citation.title.as_deref(), url), url))
        })
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Renders all search results, across groups, as a link-per-line list.
///
/// Entries without a URL are skipped. Returns `None` if nothing remains.
#[must_use]
pub fn extract_search_results(metadata: &Metadata) -> Option<String> {
    let lines: Vec<String> = metadata
        .search_result_groups
        .iter()
        .flatten()
        .flat_map(|group| &group.entries)
        .filter_map(|entry| {
            let url = entry.url.as_deref()?;
            Some(markdown_link(link_label(entry.title.as_deref(), url), url))
        })
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Converts bare `http`/`https` URLs into Markdown links.
///
/// Existing links, autolinks, inline code and fenced code blocks are left
/// alone. Trailing sentence punctuation stays outside the link.
#[must_use]
pub fn linkify_bare_urls(text: &str) -> String {
    let mut in_fence = false;
    text.split('\n')
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_owned();
            }
            if in_fence {
                return line.to_owned();
            }
            LINK_OR_URL
                .replace_all(line, |caps: &Captures<'_>| {
                    let matched = &caps[0];
                    if !matched.starts_with("http") {
                        return matched.to_owned();
                    }
                    let url = matched.trim_end_matches(['.', ',', ';', ':', '!', '?']);
                    let rest = &matched[url.len()..];
                    format!("{}{rest}", markdown_link(url, url))
                })
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Citation, SearchEntry, SearchResultGroup};

    fn citation(id: &str, url: &str, title: Option<&str>) -> Citation {
        Citation {
            id: Some(id.into()),
            url: Some(url.into()),
            title: title.map(Into::into),
            detail: None,
        }
    }

    fn with_citations(citations: Vec<Citation>) -> Metadata {
        Metadata {
            citations: Some(citations),
            ..Default::default()
        }
    }

    fn token(ids: &str) -> String {
        format!("\u{E200}cite\u{E202}{ids}\u{E201}")
    }

    #[test]
    fn builds_map_with_titles() {
        let metadata = with_citations(vec![citation("a", "https://a.example/x", Some("Alpha"))]);
        let map = build_citation_map(&metadata);

        assert_eq!(map["a"], "[Alpha](https://a.example/x)");
    }

    #[test]
    fn falls_back_to_last_path_segment() {
        let metadata = with_citations(vec![
            citation("a", "https://a.example/docs/page.html", Some("  ")),
            citation("b", "https://b.example/dir/?q=1", None),
            citation("c", "https://c.example", None),
        ]);
        let map = build_citation_map(&metadata);

        assert_eq!(map["a"], "[page.html](https://a.example/docs/page.html)");
        assert_eq!(map["b"], "[dir](https://b.example/dir/?q=1)");
        assert_eq!(map["c"], "[c.example](https://c.example)");
    }

    #[test]
    fn skips_citations_without_id_or_url() {
        let metadata = with_citations(vec![
            Citation {
                id: None,
                url: Some("https://x.example".into()),
                ..Default::default()
            },
            Citation {
                id: Some("y".into()),
                url: None,
                ..Default::default()
            },
        ]);
        assert!(build_citation_map(&metadata).is_empty());
    }

    #[test]
    fn first_citation_wins_for_repeated_id() {
        let metadata = with_citations(vec![
            citation("a", "https://first.example", Some("First")),
            citation("a", "https://second.example", Some("Second")),
        ]);
        assert_eq!(build_citation_map(&metadata)["a"], "[First](https://first.example)");
    }

    #[test]
    fn resolves_known_placeholder() {
        let map = CitationMap::from([("turn0search1".into(), "[A](https://a.example)".into())]);
        let text = format!("Fact {}.", token("turn0search1"));

        assert_eq!(resolve_placeholders(&text, &map), "Fact [A](https://a.example).");
    }

    #[test]
    fn drops_unknown_placeholder() {
        let text = format!("Fact {}.", token("missing"));
        assert_eq!(resolve_placeholders(&text, &CitationMap::new()), "Fact .");
    }

    #[test]
    fn resolves_multiple_ids_in_one_token() {
        let map = CitationMap::from([
            ("a".into(), "[A](https://a.example)".into()),
            ("b".into(), "[B](https://b.example)".into()),
        ]);
        let text = token("a\u{E202}nope\u{E202}b");

        assert_eq!(
            resolve_placeholders(&text, &map),
            "[A](https://a.example) [B](https://b.example)"
        );
    }

    #[test]
    fn extracts_citation_list_without_duplicates() {
        let metadata = with_citations(vec![
            citation("a", "https://a.example", Some("A")),
            citation("b", "https://a.example", Some("A again")),
            citation("c", "https://c.example/page", None),
        ]);

        assert_eq!(
            extract_citations(&metadata).as_deref(),
            Some("[A](https://a.example)\n[page](https://c.example/page)")
        );
    }

    #[test]
    fn no_citation_list_when_empty() {
        assert!(extract_citations(&Metadata::default()).is_none());
        assert!(extract_citations(&with_citations(vec![])).is_none());
    }

    #[test]
    fn flattens_search_result_groups() {
        let metadata = Metadata {
            search_result_groups: Some(vec![
                SearchResultGroup {
                    domain: Some("a.example".into()),
                    entries: vec![
                        SearchEntry {
                            url: Some("https://a.example/1".into()),
                            title: Some("One".into()),
                            snippet: None,
                        },
                        SearchEntry {
                            url: None,
                            title: Some("Skipped".into()),
                            snippet: None,
                        },
                    ],
                },
                SearchResultGroup {
                    domain: None,
                    entries: vec![SearchEntry {
                        url: Some("https://b.example/2".into()),
                        title: None,
                        snippet: None,
                    }],
                },
            ]),
            ..Default::default()
        };

        assert_eq!(
            extract_search_results(&metadata).as_deref(),
            Some("[One](https://a.example/1)\n[2](https://b.example/2)")
        );
    }

    #[test]
    fn linkifies_bare_url() {
        assert_eq!(
            linkify_bare_urls("see https://example.com/a for more"),
            "see [https://example.com/a](https://example.com/a) for more"
        );
    }

    #[test]
    fn keeps_trailing_punctuation_outside_link() {
        assert_eq!(
            linkify_bare_urls("Visit http://example.com."),
            "Visit [http://example.com](http://example.com)."
        );
    }

    #[test]
    fn keeps_balanced_parentheses_in_url() {
        assert_eq!(
            linkify_bare_urls("(see https://en.wikipedia.org/wiki/Rust_(programming_language))"),
            "(see [https://en.wikipedia.org/wiki/Rust_(programming_language)]\
             (https://en.wikipedia.org/wiki/Rust_(programming_language)))"
        );
    }

    #[test]
    fn stops_url_at_quotes() {
        assert_eq!(
            linkify_bare_urls(r#"<a href="https://x.example">x</a> or 'https://y.example'"#),
            r#"<a href="[https://x.example](https://x.example)">x</a> or '[https://y.example](https://y.example)'"#
        );
    }

    #[test]
    fn leaves_links_with_parentheses_alone() {
        let text = "[Rust](https://en.wikipedia.org/wiki/Rust_(programming_language))";
        assert_eq!(linkify_bare_urls(text), text);
    }

    #[test]
    fn leaves_existing_links_alone() {
        let text = "[Example](https://example.com) and <https://auto.example> and `https://code.example`";
        assert_eq!(linkify_bare_urls(text), text);
    }

    #[test]
    fn leaves_fenced_code_alone() {
        let text = "```\ncurl https://example.com\n```\nhttps://after.example";
        assert_eq!(
            linkify_bare_urls(text),
            "```\ncurl https://example.com\n```\n[https://after.example](https://after.example)"
        );
    }
}
