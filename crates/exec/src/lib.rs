//! Non-interactive execution mode: run exactly one turn against a fresh
//! `AgentState` and report the result, for automation and scripting use
//! cases that have no need for the `Op`/`Event` queue pair's session
//! lifetime.
//!
//! ```no_run
//! use nsk_exec::{run_exec, ExecConfig, OutputMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ExecConfig::new("fix the null check in parser.rs")
//!         .with_output_mode(OutputMode::Human);
//!     let result = run_exec(config).await?;
//!     println!("{}", result.final_response);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod output;
mod runner;

pub use config::{ExecConfig, OutputMode};
pub use error::{ExecError, Result};
pub use output::{ExecOutput, HumanOutputHandler, JsonOutputHandler, OutputHandler};
pub use runner::{run_exec, run_exec_with_handler, ExecResult};
