// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for gpt2md.
//!
//! This binary provides the `gpt2md` command for converting ChatGPT
//! conversation exports from JSON to Markdown files.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use gpt2md::{output, parser, renderer};
use lexopt::prelude::*;
use snafu::{ensure, prelude::*};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// File name of the conversation archive inside a ChatGPT export.
const ARCHIVE_FILE_NAME: &str = "conversations.json";

struct Cli {
    input: Vec<PathBuf>,
    output: PathBuf,
    date_format: Option<String>,
    quiet: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file or directory is required"))]
    NoInputFiles,

    #[snafu(display("no {ARCHIVE_FILE_NAME} found in the given inputs"))]
    NoArchives,

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseFile {
        path: PathBuf,
        source: parser::ParseError,
    },

    #[snafu(display("failed to render {}: {source}", path.display()))]
    Render {
        path: PathBuf,
        source: renderer::RenderError,
    },

    #[snafu(display("{source}"))]
    Output { source: output::WriteError },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert ChatGPT conversation exports to Markdown

Usage: {name} [OPTIONS] -o <OUTPUT> <INPUT>...

Arguments:
  <INPUT>...  {ARCHIVE_FILE_NAME} files, or directories containing them

Options:
  -o, --output <OUTPUT>     Output directory (created if missing)
      --date-format <FMT>   strftime format for front-matter timestamps
                            (default: %Y-%m-%d %H:%M:%S, UTC)

Other options:
  -q, --quiet               Suppress progress messages
  -n, --dry-run             Show what would be written without writing
  -f, --force               Overwrite existing output files
  -h, --help                Print help
  -V, --version             Print version

Set RUST_LOG=debug for details on skipped messages.",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output: Option<PathBuf> = None;
    let mut date_format = None;
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => output = Some(parser.value()?.parse()?),
            Long("date-format") => {
                let val = parser.value()?.string()?;
                if StrftimeItems::new(&val).any(|item| matches!(item, Item::Error)) {
                    return Err(format!("invalid --date-format: {val}").into());
                }
                date_format = Some(val);
            }
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output: output.ok_or("missing required option: --output")?,
        date_format,
        quiet,
        dry_run,
        force,
    })
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    init_logging(cli.quiet);

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    let archives = collect_archives(&cli.input);
    ensure!(!archives.is_empty(), NoArchivesSnafu);

    // Parse everything up front so shape errors abort before any write
    let mut parsed = Vec::with_capacity(archives.len());
    for path in archives {
        let json = std::fs::read_to_string(&path).context(ReadFileSnafu { path: &path })?;
        let conversations =
            parser::parse_archive(&json).context(ParseFileSnafu { path: &path })?;
        parsed.push((path, conversations));
    }

    if !cli.dry_run {
        output::create_output_dir(&cli.output).context(OutputSnafu)?;
    }

    let opts = make_render_options(&cli);
    let mut namer = output::FileNamer::new();
    for (path, conversations) in &parsed {
        for conversation in conversations {
            let out_path = cli.output.join(namer.file_name(conversation));
            let markdown = renderer::render_conversation(conversation, &opts)
                .context(RenderSnafu { path })?;
            write_conversation(&out_path, &markdown, conversation, &cli)?;
        }
    }

    Ok(())
}

/// Collects archive files from the given inputs (files and directories).
///
/// Directories are searched recursively for `conversations.json`.
fn collect_archives(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && e.file_name() == ARCHIVE_FILE_NAME)
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Creates render options from CLI arguments.
fn make_render_options(cli: &Cli) -> renderer::RenderOptions {
    let date_format = cli.date_format.clone().map(|format| {
        Arc::new(move |dt: DateTime<Utc>| dt.format(&format).to_string())
            as renderer::DateFormatter
    });
    renderer::RenderOptions { date_format }
}

/// Writes one rendered conversation, honoring dry-run and overwrite settings.
fn write_conversation(
    out_path: &Path,
    markdown: &str,
    conversation: &parser::Conversation,
    cli: &Cli,
) -> Result<(), Error> {
    if cli.dry_run {
        log::info!("Would write {}", out_path.display());
        return Ok(());
    }

    if out_path.exists() && !cli.force {
        log::info!(
            "Skipping {} (already exists, use --force to overwrite)",
            out_path.display()
        );
        return Ok(());
    }

    output::write_document(out_path, markdown, conversation).context(OutputSnafu)?;
    log::info!("Wrote {}", out_path.display());
    Ok(())
}
