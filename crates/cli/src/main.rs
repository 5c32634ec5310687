//! Top-level binary: loads config, initializes logging, and wires a
//! kernel-driven agent session. Three modes:
//!
//! - `nsk "prompt"` / `nsk --exec "prompt"`: run one turn and print the
//!   surface response.
//! - `nsk --mcp-server`: serve the agent over MCP on stdio.
//! - `nsk` with no prompt: an interactive REPL reading lines from stdin,
//!   one turn per line, printing each surface response. No rendering
//!   beyond that; a terminal UI is out of scope for this workspace.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use nsk_cli::{build_llm_client, init_tracing, resolve_config};
use nsk_core::{AgentState, Op, Session};

#[ctor::ctor]
fn harden_process() {
    nsk_process_hardening::pre_main_hardening();
}

#[derive(Parser, Debug)]
#[command(name = "nsk", author, version, about = "Deductive-kernel coding agent")]
struct Args {
    /// Prompt to run non-interactively. If omitted, reads an interactive
    /// loop from stdin instead.
    prompt: Option<String>,

    /// Run in non-interactive mode with the given prompt (alias for the
    /// positional argument).
    #[arg(short, long)]
    exec: Option<String>,

    /// Serve the agent over MCP (stdio transport) instead of running a turn.
    #[arg(long)]
    mcp_server: bool,

    /// Working directory for file operations.
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Path to a config TOML file (default: ~/.neurokernel/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// LLM model override.
    #[arg(short, long)]
    model: Option<String>,

    /// Emit JSON Lines output instead of plain text (exec mode only).
    #[arg(long)]
    json: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.mcp_server {
        let config = nsk_mcp_server::McpServerConfig::default().with_working_dir(
            args.working_dir
                .clone()
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default()),
        );
        nsk_mcp_server::run_mcp_server(config)
            .await
            .map_err(|e| anyhow::anyhow!("mcp server error: {e}"))?;
        return Ok(());
    }

    let config = resolve_config(args.config.as_deref(), args.working_dir.clone(), args.model.clone())?;

    let prompt = args.prompt.clone().or(args.exec.clone());

    if let Some(prompt) = prompt {
        let output_mode = if args.json {
            nsk_exec::OutputMode::Json
        } else {
            nsk_exec::OutputMode::Human
        };
        let exec_config = nsk_exec::ExecConfig::new(prompt)
            .with_working_dir(config.workspace_root.clone())
            .with_model(config.model.clone())
            .with_output_mode(output_mode)
            .with_verbose(args.verbose);

        match nsk_exec::run_exec(exec_config).await {
            Ok(_) => Ok(()),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        run_interactive(config).await
    }
}

async fn run_interactive(config: nsk_core::Config) -> Result<()> {
    let llm = build_llm_client(&config);
    let state = AgentState::boot(config, llm)?;
    let session = Session::spawn(state);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            print!("> ");
            stdout.flush()?;
            continue;
        }
        if line.trim() == "exit" || line.trim() == "quit" {
            session.submit(Op::Shutdown).await?;
            break;
        }

        session
            .submit(Op::UserInput {
                message: line,
            })
            .await?;

        loop {
            match session.next_event().await {
                Ok(nsk_core::Event::TurnComplete { surface_response, .. }) => {
                    println!("{surface_response}");
                    break;
                }
                Ok(nsk_core::Event::TurnFailed { error, .. }) => {
                    eprintln!("Error: {error}");
                    break;
                }
                Ok(nsk_core::Event::TurnAborted { .. }) => {
                    eprintln!("(turn aborted)");
                    break;
                }
                Ok(nsk_core::Event::TurnStarted { .. }) => continue,
                Ok(nsk_core::Event::SessionShutdown) => return Ok(()),
                Err(_) => return Ok(()),
            }
        }

        print!("> ");
        stdout.flush()?;
    }

    Ok(())
}
