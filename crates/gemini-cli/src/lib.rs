//! # gemini-cli
//!
//! **CLI Binary**
//!
//! Parses `gemini-config::Cli` and dispatches to the `hash`/`query`/`report`
//! workflows, wiring `gemini-core`/`gemini-report`/`gemini-format` against
//! a `gemini-backend-port::MemoryIndex` persisted as a JSON snapshot under
//! `--keyspace` between invocations (spec §6 "CLI surface").
//!
//! ## Responsibilities
//! * Parse command line arguments
//! * Load the persisted index and vocabulary
//! * Dispatch to a command handler and print its rendered output
//! * Map `GeminiError` to the spec's fixed exit codes
//!
//! ## What does NOT belong here
//! * Any of the five algorithmic components (`gemini-core` orchestrates
//!   them; `gemini-wmh`/`gemini-features`/`gemini-vocab` implement them)
//! * A real AST/feature-extraction/backend client — none exists anywhere
//!   in this workspace's dependency stack, so every command wires
//!   `gemini-extract`'s deterministic fakes (spec frames both services as
//!   external RPC collaborators out of the core's implementation scope)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use gemini_backend_port::{BandIndex, MemoryIndex};
use gemini_config::{Cli, Command, FormatArg, GlobalArgs, OutputArg};
use gemini_core::{build_and_upsert, query, FunctionFilter};
use gemini_errors::GeminiError;
use gemini_extract::{FakeAstService, FakeFeatureSource};
use gemini_format::{render_query_json, render_query_text, render_report_json, render_report_text, ReportFormat};
use gemini_report::{detect_communities, detect_duplicate_groups, resolve_communities, ReportEnvelope};
use gemini_types::{DocFreq, Mode, RepoFile};
use gemini_vocab::Vocabulary;

fn output_to_format(output: OutputArg) -> gemini_format::OutputFormat {
    match output {
        OutputArg::Text => gemini_format::OutputFormat::Text,
        OutputArg::Json => gemini_format::OutputFormat::Json,
    }
}

fn format_to_report_format(format: FormatArg) -> ReportFormat {
    match format {
        FormatArg::Plain => ReportFormat::Plain,
        FormatArg::Condensed => ReportFormat::Condensed,
        FormatArg::UseGroupBy => ReportFormat::UseGroupBy,
    }
}

/// Load the vocabulary per spec §6 "Persisted vocabulary": channel (a), a
/// JSON file named by `--vocab`, wins when present; otherwise channel (b),
/// the backend's own `features_docs`/`features_freq` tables. A keyspace
/// with neither yet (e.g. a brand-new one) falls back to the empty
/// vocabulary (spec §4.B "empty vocabulary is valid"), under which every
/// feature is dropped and builds simply produce empty sketches.
fn resolve_vocabulary(global: &GlobalArgs, index: &MemoryIndex) -> Result<Vocabulary, GeminiError> {
    if let Some(path) = &global.vocab {
        let json = fs::read_to_string(path)
            .map_err(|e| GeminiError::ArgumentError(format!("reading vocab file {}: {e}", path.display())))?;
        return Vocabulary::load(&json);
    }
    if let Some(doc_freq) = index.load_vocabulary(global.mode)? {
        return Vocabulary::from_doc_freq(doc_freq);
    }
    Vocabulary::from_doc_freq(DocFreq {
        docs: 0,
        tokens: Vec::new(),
        df: std::collections::BTreeMap::new(),
    })
}

fn keyspace_path(global: &GlobalArgs) -> PathBuf {
    PathBuf::from(&global.keyspace)
}

fn load_index(global: &GlobalArgs) -> Result<MemoryIndex, GeminiError> {
    MemoryIndex::load_from_path(&keyspace_path(global))
}

fn run_hash(global: &GlobalArgs, args: gemini_config::HashArgs) -> Result<(), GeminiError> {
    let mut index = load_index(global)?;
    let vocab = resolve_vocabulary(global, &index)?;

    let content = fs::read(&args.path)
        .map_err(|e| GeminiError::ArgumentError(format!("reading {}: {e}", args.path.display())))?;
    let repo = RepoFile {
        repo: args.repo,
        commit: args.commit,
        path: args.path.display().to_string(),
        sha1: gemini_core::content_sha1(&content),
    };

    let skipped = build_and_upsert(
        &mut index,
        &FakeAstService,
        Arc::new(FakeFeatureSource),
        &vocab,
        &repo,
        &content,
        global.mode,
    )?;

    index.save_to_path(&keyspace_path(global))?;

    println!("hashed {} ({} mode)", args.path.display(), global.mode);
    if skipped.total() > 0 {
        for (class, count) in skipped.iter() {
            println!("  skipped {class}: {count}");
        }
    }
    Ok(())
}

fn run_query(global: &GlobalArgs, args: gemini_config::QueryArgs) -> Result<(), GeminiError> {
    let index = load_index(global)?;
    let vocab = resolve_vocabulary(global, &index)?;

    let content = fs::read(&args.file)
        .map_err(|e| GeminiError::ArgumentError(format!("reading {}: {e}", args.file.display())))?;

    let filter = match (&args.function, args.line) {
        (Some(name), Some(start_line)) => Some(FunctionFilter {
            name: name.clone(),
            start_line,
        }),
        (None, None) => None,
        _ => {
            return Err(GeminiError::ArgumentError(
                "--function and --line must be given together".to_string(),
            ))
        }
    };

    let result = query(
        &index,
        &FakeAstService,
        Arc::new(FakeFeatureSource),
        &vocab,
        &args.file.display().to_string(),
        &content,
        global.mode,
        filter,
    )?;

    match output_to_format(args.output) {
        gemini_format::OutputFormat::Text => print!("{}", render_query_text(&result.duplicates, &result.similar)),
        gemini_format::OutputFormat::Json => {
            println!("{}", render_query_json(global.mode, &result.duplicates, &result.similar))
        }
    }
    Ok(())
}

fn write_cc_output(dir: &Path, mode: Mode, index: &MemoryIndex) -> Result<(), GeminiError> {
    fs::create_dir_all(dir).map_err(|e| GeminiError::ArgumentError(format!("creating {}: {e}", dir.display())))?;
    let communities = detect_communities(index, mode)?;
    for (i, community) in communities.iter().enumerate() {
        let path = dir.join(format!("community-{i}.txt"));
        fs::write(&path, community.members.join("\n"))
            .map_err(|e| GeminiError::ArgumentError(format!("writing {}: {e}", path.display())))?;
    }
    Ok(())
}

fn run_report(global: &GlobalArgs, args: gemini_config::ReportArgs) -> Result<(), GeminiError> {
    let index = load_index(global)?;

    let spinner = gemini_progress::Progress::new(args.output == OutputArg::Text);
    spinner.set_message("scanning for exact duplicates");
    let duplicates = detect_duplicate_groups(&index)?;
    spinner.set_message("detecting similarity communities");
    let communities = detect_communities(&index, global.mode)?;
    let similarities = resolve_communities(&index, global.mode, &communities)?;
    spinner.finish_and_clear();

    if let Some(dir) = &args.cc_output {
        write_cc_output(dir, global.mode, &index)?;
    }

    let envelope = ReportEnvelope::new(
        "gemini",
        "2026-01-01T00:00:00Z",
        global.mode,
        duplicates,
        similarities,
        communities,
        std::collections::BTreeMap::new(),
    );

    let report_format = format_to_report_format(args.format);
    match output_to_format(args.output) {
        gemini_format::OutputFormat::Text => print!("{}", render_report_text(&envelope)),
        gemini_format::OutputFormat::Json => println!("{}", render_report_json(&envelope, report_format)),
    }
    Ok(())
}

/// Parse arguments and dispatch, returning the process exit code spec §6
/// fixes (`GeminiError::exit_code`; success is always `0`).
pub fn run() -> i32 {
    let cli = Cli::parse();
    let global = cli.global;
    let result = match cli.command {
        Command::Hash(args) => run_hash(&global, args),
        Command::Query(args) => run_query(&global, args),
        Command::Report(args) => run_report(&global, args),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}
