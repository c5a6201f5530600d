//! Mermake CLI - a headless, line-oriented driver for the diagram engine.
//!
//! The rendering surface (live Mermaid preview, editor widget) is out of
//! scope; this binary wires config, gateway, and engine together and drives
//! the session from stdin:
//!
//! ```text
//! > add a retry loop around the gateway call      # free-text AI update
//! > :new flowchart ./src -- login flow            # generate from a folder
//! > :merge ./src/session.rs                       # merge files into diagram
//! > :undo  :redo  :clear  :show  :quit
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use mermake_config::MermakeConfig;
use mermake_engine::{FileSelection, RunOutcome, Session};
use mermake_gateway::HttpGateway;
use mermake_types::{DiagramKind, NonEmptyString};

const SEED_DIAGRAM: &str = "graph TD
  A[Start] --> B[Show seed diagram]
  B --> C{User action}
  C -->|Edit| D[Hand edit]
  C -->|Undo / Redo| E[History]
  C -->|Instruction| F[Ask the generation service]
  C -->|Upload files| F
  F -->|Success| G[Commit new diagram]
  F -->|Failure| H[Show error, keep diagram]
  D --> C
  E --> C
  G --> C
  H --> C";

const HELP: &str = "Commands:
  :show                      print the current diagram
  :undo / :redo              move through history
  :clear                     clear the diagram (undoable)
  :new <kind> <path>... [-- focus]
                             generate a new diagram from files or a folder
                             (kind: sequence | class | flowchart)
  :merge <path>... [-- focus]
                             merge file information into the current diagram
  :help                      show this help
  :quit                      exit
Any other non-empty line is sent as a free-text instruction.";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = MermakeConfig::load();
    // Missing credential is fatal at startup, not a per-request error.
    let api_key = config
        .resolve_api_key()
        .context("cannot start without a generation service credential")?;
    let endpoint = config.endpoint();
    tracing::debug!(%endpoint, "Using generation service endpoint");
    let gateway = HttpGateway::new(endpoint, api_key);
    let mut session = Session::new(SEED_DIAGRAM, gateway, config.record_unchanged());

    println!("mermake - Mermaid editor with AI-assisted generation");
    println!("{HELP}");
    print_document(&session);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_whitespace().next() {
            Some(":quit" | ":q") => break,
            Some(":help") => println!("{HELP}"),
            Some(":show") => print_document(&session),
            Some(":undo") => {
                if session.undo() {
                    print_document(&session);
                } else {
                    println!("(already at the earliest state)");
                }
            }
            Some(":redo") => {
                if session.redo() {
                    print_document(&session);
                } else {
                    println!("(already at the latest state)");
                }
            }
            Some(":clear") => {
                session.clear();
                print_document(&session);
            }
            Some(":new") => {
                let args: Vec<&str> = line.split_whitespace().skip(1).collect();
                match parse_generate_args(&args) {
                    Ok((kind, selection, focus)) => {
                        let focus = focus.as_ref().map(NonEmptyString::as_str);
                        let outcome = session
                            .generate_from_files(&selection, kind, focus)
                            .await;
                        report(&mut session, outcome);
                    }
                    Err(message) => println!("{message}"),
                }
            }
            Some(":merge") => {
                let args: Vec<&str> = line.split_whitespace().skip(1).collect();
                match parse_selection_args(&args) {
                    Ok((selection, focus)) => {
                        let focus = focus.as_ref().map(NonEmptyString::as_str);
                        let outcome = session.update_from_files(&selection, focus).await;
                        report(&mut session, outcome);
                    }
                    Err(message) => println!("{message}"),
                }
            }
            Some(command) if command.starts_with(':') => {
                println!("Unknown command {command}; try :help");
            }
            _ => {
                let outcome = session.update_free_text(line).await;
                report(&mut session, outcome);
            }
        }
    }

    Ok(())
}

fn parse_generate_args(
    args: &[&str],
) -> std::result::Result<(DiagramKind, FileSelection, Option<NonEmptyString>), String> {
    let Some((kind_arg, rest)) = args.split_first() else {
        return Err("Usage: :new <sequence|class|flowchart> <path>... [-- focus]".to_string());
    };
    let kind: DiagramKind = kind_arg.parse().map_err(|e| format!("{e}"))?;
    let (selection, focus) = parse_selection_args(rest)?;
    Ok((kind, selection, focus))
}

fn parse_selection_args(
    args: &[&str],
) -> std::result::Result<(FileSelection, Option<NonEmptyString>), String> {
    let (paths, focus) = match args.iter().position(|arg| *arg == "--") {
        Some(split) => (&args[..split], Some(args[split + 1..].join(" "))),
        None => (args, None),
    };
    let focus = focus.and_then(|hint| NonEmptyString::new(hint).ok());

    if paths.is_empty() {
        return Err("No files or folder given".to_string());
    }

    let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
    // A single directory argument means "folder selection" (filtered); any
    // list of files is a flat selection (unfiltered).
    let selection = if paths.len() == 1 && paths[0].is_dir() {
        FileSelection::Folder(paths.into_iter().next().unwrap_or_default())
    } else {
        FileSelection::Files(paths)
    };
    Ok((selection, focus))
}

fn report(
    session: &mut Session<HttpGateway>,
    outcome: std::result::Result<RunOutcome, mermake_engine::SessionError>,
) {
    match outcome {
        Ok(RunOutcome::Committed { notice }) => {
            if let Some(notice) = notice {
                println!("Note: {notice}");
            }
            session.acknowledge();
            print_document(session);
        }
        Ok(RunOutcome::Skipped) => println!("(empty instruction ignored)"),
        Ok(RunOutcome::Failed { message, notice }) => {
            if let Some(notice) = notice {
                println!("Note: {notice}");
            }
            println!("Error: {message}");
            println!("The diagram was left unchanged; try again.");
            session.acknowledge();
        }
        Err(err) => println!("Error: {err}"),
    }
}

fn print_document(session: &Session<HttpGateway>) {
    println!("--- diagram ({}/{}) ---", session.history_index() + 1, session.history_len());
    println!("{}", session.content());
    println!("-----------------------");
}
