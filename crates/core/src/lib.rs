//! The turn coordinator: wires Perception, the kernel, the Effect
//! Dispatcher, the Shard Scheduler, and Articulation into one session.
//! Owns [`AgentState`] (the bundle of long-lived service objects) and
//! exposes the `Op`/`Event` queue-pair surface a host process (cli, exec,
//! mcp-server) drives instead of calling the turn coordinator directly.

pub mod config;
pub mod error;
pub mod op;
pub mod state;
pub mod trace_log;
pub mod turn;

pub use config::{validate_config_toml, Config, ConfigIssue};
pub use error::{Error, Result};
pub use op::{Event, Op, Session, Submission, SUBMISSION_CHANNEL_CAPACITY};
pub use state::AgentState;
pub use trace_log::{LlmCallTrace, TraceEvent, TraceLog};
pub use turn::{run_turn, TurnInput, TurnOutput};
