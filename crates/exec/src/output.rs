//! Output handlers for exec mode: human-readable text to a writer, or
//! JSON Lines for programmatic consumption, mirroring the same
//! `Session`/`Event` stream the cli uses interactively.

use std::io::Write;
use std::sync::Mutex;

use nsk_core::Event;
use serde::Serialize;

/// Final result of one exec invocation, in a form suitable for printing or
/// serializing.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutput {
    pub session_id: String,
    pub final_response: String,
    pub actions_dispatched: usize,
    pub status: String,
}

/// Handles streamed `Event`s during a turn and the final `ExecOutput`.
pub trait OutputHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
    fn print_final(&self, output: &ExecOutput);
}

/// Emits one JSON object per event, then the final output, each on its own
/// line.
pub struct JsonOutputHandler<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonOutputHandler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send + Sync> OutputHandler for JsonOutputHandler<W> {
    fn handle_event(&self, event: &Event) {
        if let Ok(json) = serde_json::to_string(event) {
            if let Ok(mut writer) = self.writer.lock() {
                let _ = writeln!(writer, "{json}");
                let _ = writer.flush();
            }
        }
    }

    fn print_final(&self, output: &ExecOutput) {
        if let Ok(json) = serde_json::to_string(output) {
            if let Ok(mut writer) = self.writer.lock() {
                let _ = writeln!(writer, "{json}");
            }
        }
    }
}

/// Prints a short progress line per event when `verbose`, and the surface
/// response at the end either way.
pub struct HumanOutputHandler<W: Write + Send> {
    writer: Mutex<W>,
    verbose: bool,
}

impl<W: Write + Send> HumanOutputHandler<W> {
    pub fn new(writer: W, verbose: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            verbose,
        }
    }
}

impl<W: Write + Send + Sync> OutputHandler for HumanOutputHandler<W> {
    fn handle_event(&self, event: &Event) {
        if !self.verbose {
            return;
        }
        let line = match event {
            Event::TurnStarted { .. } => Some("[turn] started".to_string()),
            Event::TurnComplete { .. } => Some("[turn] complete".to_string()),
            Event::TurnAborted { .. } => Some("[turn] aborted".to_string()),
            Event::TurnFailed { error, .. } => Some(format!("[turn] failed: {error}")),
            Event::SessionShutdown => Some("[session] shutdown".to_string()),
        };
        if let Some(line) = line {
            if let Ok(mut writer) = self.writer.lock() {
                let _ = writeln!(writer, "{line}");
                let _ = writer.flush();
            }
        }
    }

    fn print_final(&self, output: &ExecOutput) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer);
            let _ = writeln!(writer, "{}", output.final_response);
        }
    }
}
