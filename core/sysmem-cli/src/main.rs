//! sysmem: command-line driver for project change detection and session state.
//!
//! Every subcommand prints JSON on stdout. Exit status is 1 when the project
//! root is not an existing directory, or when the requested operation reported
//! failure or found nothing (no session, save failed), 0 otherwise.
//!
//! ## Subcommands
//!
//! - `fingerprint`: Scan a project and print its fingerprint
//! - `check`: Classify changes since the stored fingerprint
//! - `session`: Create, inspect and navigate the authoring session

mod logging;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use sysmem_core::{
    ChangeLevel, ChangeReport, CollectionAction, Mode, StorageConfig, SysmemEngine,
};

#[derive(Parser)]
#[command(name = "sysmem")]
#[command(about = "Project fingerprinting, change detection and session state")]
#[command(version)]
struct Cli {
    /// Project root holding sysmem state
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project and print its fingerprint
    Fingerprint {
        /// Project to scan (defaults to --root)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Store the result as the new baseline
        #[arg(long)]
        save: bool,
    },

    /// Decide whether the project needs re-collection
    Check {
        /// Project to check (defaults to --root)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Store the new fingerprint after classifying
        #[arg(long)]
        save: bool,
    },

    /// Authoring session state
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Start a new session, replacing any existing one
    Create {
        #[arg(long, default_value = "setting")]
        mode: Mode,

        #[arg(long, default_value_t = 0)]
        chapter: u32,

        /// Context window budget (default 128000)
        #[arg(long)]
        token_limit: Option<u32>,
    },

    /// Print a summary of the current session
    Info,

    /// Switch between setting and writing mode
    Switch {
        #[arg(value_name = "MODE")]
        mode: Mode,

        /// Extra detail recorded with the switch (value parsed as JSON when possible)
        #[arg(long = "detail", value_name = "KEY=VALUE", value_parser = parse_detail)]
        details: Vec<(String, Value)>,
    },

    /// Move to a chapter
    Jump {
        #[arg(value_name = "N")]
        chapter: u32,

        #[arg(long)]
        force: bool,
    },
}

fn parse_detail(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    #[serde(flatten)]
    report: &'a ChangeReport,
    action: CollectionAction,
    recommendation: Option<&'static str>,
    saved: Option<bool>,
}

#[derive(Serialize)]
struct StatusOutput {
    ok: bool,
}

/// The project the command operates on; must be an existing directory.
fn project_root(cli: &Cli) -> Result<PathBuf, String> {
    let root = match &cli.command {
        Commands::Fingerprint { path: Some(p), .. } | Commands::Check { path: Some(p), .. } => {
            p.clone()
        }
        _ => cli.root.clone(),
    };
    if root.is_dir() {
        Ok(root)
    } else {
        Err(format!("{} is not a directory", root.display()))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let root = match project_root(&cli) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("sysmem: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _logging_guard = logging::init(&StorageConfig::with_root(&root).log_dir());

    let engine = SysmemEngine::open(root);
    match cli.command {
        Commands::Fingerprint { save, .. } => {
            let fingerprint = engine.fingerprint();
            let saved = !save || engine.detector().commit(&fingerprint);
            emit(&fingerprint, saved)
        }
        Commands::Check { save, .. } => {
            let (report, fingerprint) = engine.check();
            let saved = save.then(|| engine.detector().commit(&fingerprint));
            let output = CheckOutput {
                report: &report,
                action: report.action(),
                recommendation: report.recommendation(),
                saved,
            };
            if report.level == ChangeLevel::High {
                tracing::info!(triggered = ?report.triggered_conditions, "Full collection required");
            }
            emit(&output, saved.unwrap_or(true))
        }
        Commands::Session { command } => run_session(&engine, command),
    }
}

fn run_session(engine: &SysmemEngine, command: SessionCommand) -> ExitCode {
    let sessions = engine.sessions();
    match command {
        SessionCommand::Create {
            mode,
            chapter,
            token_limit,
        } => match sessions.create(mode, chapter, token_limit) {
            Some(session) => emit(&session, true),
            None => emit(&StatusOutput { ok: false }, false),
        },
        SessionCommand::Info => match sessions.info() {
            Some(info) => emit(&info, true),
            None => {
                tracing::warn!("No session found");
                emit(&Value::Null, false)
            }
        },
        SessionCommand::Switch { mode, details } => {
            let details: BTreeMap<String, Value> = details.into_iter().collect();
            let ok = sessions.switch_mode(mode, details);
            emit(&StatusOutput { ok }, ok)
        }
        SessionCommand::Jump { chapter, force } => {
            let ok = sessions.jump_to_chapter(chapter, force);
            emit(&StatusOutput { ok }, ok)
        }
    }
}

fn emit<T: Serialize>(value: &T, ok: bool) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize output");
            return ExitCode::FAILURE;
        }
    }
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
