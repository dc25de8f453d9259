// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Writing rendered conversations to disk.
//!
//! Each conversation becomes `<sanitized title>.md` in the destination
//! directory. After writing, the file's access and modification times are
//! set to the conversation's creation and update times, so file browsers
//! sort exported notes the way ChatGPT does.

use snafu::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::parser::Conversation;

/// Characters that are not allowed in file names on common platforms.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Longest file stem produced, in characters.
const MAX_STEM_CHARS: usize = 200;

/// Error type for output failures.
#[derive(Debug, Snafu)]
pub enum WriteError {
    /// The destination directory could not be created.
    #[snafu(display("failed to create output directory {}: {source}", path.display()))]
    CreateDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A document could not be written.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    Write {
        /// The file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A written document's timestamps could not be set.
    #[snafu(display("failed to set timestamps on {}: {source}", path.display()))]
    SetTimes {
        /// The file whose timestamps could not be set.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Turns a conversation title into a file stem.
///
/// Invalid path characters, control characters and newlines become spaces,
/// whitespace runs collapse, and leading/trailing spaces and dots are
/// trimmed. Falls back to `fallback` when nothing is left.
///
/// # Example
///
/// ```
/// use gpt2md::output::sanitize_file_stem;
///
/// assert_eq!(sanitize_file_stem("What is: Rust?\nA language", "id"), "What is Rust A language");
/// assert_eq!(sanitize_file_stem("???", "abc-123"), "abc-123");
/// ```
#[must_use]
pub fn sanitize_file_stem(title: &str, fallback: &str) -> String {
    let stem = clean(title);
    if stem.is_empty() {
        let fallback = clean(fallback);
        if fallback.is_empty() {
            return "conversation".to_owned();
        }
        return fallback;
    }
    stem
}

fn clean(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                ' '
            } else {
                c
            }
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed
        .trim_matches(|c: char| c == '.' || c == ' ')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    truncated.trim_end_matches(['.', ' ']).to_owned()
}

/// Assigns distinct file names to the conversations of one run.
///
/// When two conversations sanitize to the same name (compared
/// case-insensitively), later ones get their identifier appended:
/// `Title (<id>).md`.
#[derive(Debug, Default)]
pub struct FileNamer {
    used: HashSet<String>,
}

impl FileNamer {
    /// Creates a namer with no names taken.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the file name for a conversation, reserving it.
    pub fn file_name(&mut self, conversation: &Conversation) -> String {
        let stem = sanitize_file_stem(
            conversation.title.as_deref().unwrap_or_default(),
            &conversation.id,
        );

        let mut candidate = stem.clone();
        if self.is_taken(&candidate) {
            let suffixed = format!("{stem} ({})", sanitize_file_stem(&conversation.id, "id"));
            log::warn!(
                "conversation {} has the same file name as an earlier one; writing {suffixed}.md",
                conversation.id
            );
            candidate = suffixed.clone();
            let mut n = 2;
            while self.is_taken(&candidate) {
                candidate = format!("{suffixed} {n}");
                n += 1;
            }
        }

        self.used.insert(candidate.to_lowercase());
        format!("{candidate}.md")
    }

    fn is_taken(&self, stem: &str) -> bool {
        self.used.contains(&stem.to_lowercase())
    }
}

/// Creates the destination directory if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_output_dir(dir: &Path) -> Result<(), WriteError> {
    fs::create_dir_all(dir).context(CreateDirSnafu { path: dir })
}

/// Writes a rendered document and restores the conversation's timestamps.
///
/// # Errors
///
/// Returns an error if the file cannot be written or its timestamps cannot
/// be set.
pub fn write_document(
    path: &Path,
    contents: &str,
    conversation: &Conversation,
) -> Result<(), WriteError> {
    fs::write(path, contents).context(WriteSnafu { path })?;
    restore_timestamps(path, conversation.create_time, conversation.update_time)
}

/// Sets a file's access time to `create_time` and modification time to
/// `update_time`. Missing or invalid epochs leave that time unchanged.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or updated.
pub fn restore_timestamps(
    path: &Path,
    create_time: Option<f64>,
    update_time: Option<f64>,
) -> Result<(), WriteError> {
    let accessed = create_time.and_then(system_time);
    let modified = update_time.and_then(system_time);
    if accessed.is_none() && modified.is_none() {
        return Ok(());
    }

    let mut times = FileTimes::new();
    if let Some(t) = accessed {
        times = times.set_accessed(t);
    }
    if let Some(t) = modified {
        times = times.set_modified(t);
    }

    let file = File::options()
        .write(true)
        .open(path)
        .context(SetTimesSnafu { path })?;
    file.set_times(times).context(SetTimesSnafu { path })
}

fn system_time(epoch: f64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(epoch).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str, title: Option<&str>) -> Conversation {
        Conversation::new(id, title.map(Into::into), None, None, vec![])
    }

    #[test]
    fn replaces_invalid_characters_and_newlines() {
        assert_eq!(
            sanitize_file_stem("Q: why?\n\nBecause / reasons", "id"),
            "Q why Because reasons"
        );
    }

    #[test]
    fn trims_spaces_and_dots() {
        assert_eq!(sanitize_file_stem("  ..Title..  ", "id"), "Title");
    }

    #[test]
    fn falls_back_to_identifier() {
        assert_eq!(sanitize_file_stem(":?*\n", "abc-123"), "abc-123");
        assert_eq!(sanitize_file_stem("", "abc-123"), "abc-123");
    }

    #[test]
    fn truncates_long_titles() {
        let title = "é".repeat(300);
        assert_eq!(sanitize_file_stem(&title, "id").chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn names_use_sanitized_title() {
        let mut namer = FileNamer::new();
        assert_eq!(namer.file_name(&conversation("a", Some("Rust: tips"))), "Rust tips.md");
        assert_eq!(namer.file_name(&conversation("b", None)), "b.md");
    }

    #[test]
    fn disambiguates_colliding_names() {
        let mut namer = FileNamer::new();

        assert_eq!(namer.file_name(&conversation("a", Some("Same?"))), "Same.md");
        assert_eq!(namer.file_name(&conversation("b", Some("same"))), "same (b).md");
        assert_eq!(namer.file_name(&conversation("b", Some("Same"))), "Same (b) 2.md");
    }

    #[test]
    fn writes_file_and_restores_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        let conv = Conversation::new(
            "c",
            None,
            Some(1_600_000_000.0),
            Some(1_700_000_000.5),
            vec![],
        );

        write_document(&path, "body", &conv).unwrap();

        // Times are checked before reading, since a read may bump the access time
        let metadata = fs::metadata(&path).unwrap();
        let accessed = metadata.accessed().unwrap();
        assert_eq!(
            accessed.duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1_600_000_000
        );
        let modified = metadata.modified().unwrap();
        assert_eq!(
            modified.duration_since(UNIX_EPOCH).unwrap().as_millis(),
            1_700_000_000_500
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "body");
    }

    #[test]
    fn missing_times_leave_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "x").unwrap();

        restore_timestamps(&path, None, None).unwrap();
        restore_timestamps(&path, Some(-5.0), Some(f64::NAN)).unwrap();
    }

    #[test]
    fn reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("doc.md");

        let err = write_document(&path, "x", &conversation("c", None)).unwrap_err();
        assert!(matches!(err, WriteError::Write { .. }));
        assert!(err.to_string().contains("doc.md"));
    }
}
