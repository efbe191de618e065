//! # gemini-config
//!
//! **Tier 4 (CLI Surface)**
//!
//! The `clap` argument grammar for `gemini-cli` (spec §6 "CLI surface").
//! Every flag here maps one-for-one onto a contract element the spec fixes:
//! `--mode`, `--output`, `--format`, and the exit-code-bearing subcommands
//! `hash`/`query`/`report`.
//!
//! ## What belongs here
//! * `Cli`, `GlobalArgs`, `Command` and its per-subcommand `Args` structs
//! * `OutputArg`/`FormatArg` — the `clap::ValueEnum` mirrors of
//!   `gemini-format`'s `OutputFormat`/`ReportFormat`
//!
//! ## What does NOT belong here
//! * Dispatch — parsing `Cli` into a running command (`gemini-cli`)
//! * The backend/network connection the `--host`/`--port`/`--keyspace`
//!   flags describe (spec frames the wire protocol as an external
//!   collaborator out of scope for behaviour; `gemini-backend-port`'s
//!   `MemoryIndex` is the only implementation this workspace carries)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gemini_types::Mode;

/// `gemini` — content-defined near-duplicate and similarity detection over a
/// source tree (spec §1 "Overview").
#[derive(Parser, Debug, Clone)]
#[command(name = "gemini", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand (spec §6 "CLI surface").
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Backend host. Accepted for contract fidelity; the in-memory reference
    /// backend this workspace ships does not dial out anywhere.
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Backend port. See `host`.
    #[arg(long, default_value_t = 9042, global = true)]
    pub port: u16,

    /// Keyspace name. Doubles as the JSON snapshot path the in-memory
    /// backend persists itself under between invocations (see
    /// `gemini-backend-port::MemoryIndex::save_to_path`).
    #[arg(long, default_value = "gemini", global = true)]
    pub keyspace: String,

    /// `file` or `func` similarity granularity (spec §3 "Similarity mode").
    #[arg(long, value_enum, default_value_t = Mode::File, global = true)]
    pub mode: Mode,

    /// Vocabulary JSON file, persisted-vocabulary channel (a) (spec §6
    /// "Persisted vocabulary"). When absent, falls back to channel (b), the
    /// `features_docs`/`features_freq` tables the backend itself carries.
    #[arg(long, global = true)]
    pub vocab: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Extract features, sketch, and upsert one file's bands into the index
    /// (spec §4.A-F).
    Hash(HashArgs),
    /// Look up one file's exact duplicates and LSH-candidate similar files
    /// (spec §4.G).
    Query(QueryArgs),
    /// Emit the full exact-duplicate and similarity-community report for
    /// the index (spec §4.H).
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HashArgs {
    /// File to hash and index.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Repository identifier to record as provenance (spec §3 "RepoFile").
    #[arg(long)]
    pub repo: String,

    /// Commit identifier to record as provenance.
    #[arg(long)]
    pub commit: String,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// File to query.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Repository identifier this file belongs to.
    #[arg(long)]
    pub repo: String,

    /// Commit identifier this file belongs to.
    #[arg(long)]
    pub commit: String,

    /// Function name to scope the query to, in `--mode func` (spec §4.B
    /// "FunctionFilter").
    #[arg(long)]
    pub function: Option<String>,

    /// Line number to scope the query to, in `--mode func`.
    #[arg(long)]
    pub line: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputArg::Text)]
    pub output: OutputArg,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, value_enum, default_value_t = OutputArg::Text)]
    pub output: OutputArg,

    #[arg(long, value_enum, default_value_t = FormatArg::Plain)]
    pub format: FormatArg,

    /// Directory to additionally write one file per connected-component
    /// community to (spec §4.H "per-community output").
    #[arg(long)]
    pub cc_output: Option<PathBuf>,
}

/// `--output` (spec §6).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputArg {
    Text,
    Json,
}

/// `--format`, report-only (spec §6 `Grouped|ExpandedGroup|Empty`).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatArg {
    /// `--format ""` / the default — spelled `plain` here since clap's
    /// `ValueEnum` cannot round-trip an empty-string variant name.
    #[default]
    Plain,
    Condensed,
    UseGroupBy,
}
