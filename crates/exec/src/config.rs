//! Configuration for exec mode: one prompt, in, one turn, out.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Output mode for exec results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Human,
    Json,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Human => write!(f, "human"),
            OutputMode::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputMode::Human),
            "json" | "jsonl" => Ok(OutputMode::Json),
            _ => Err(format!("unknown output mode: {s}. Use 'human' or 'json'")),
        }
    }
}

/// Configuration for one non-interactive exec invocation.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub prompt: String,
    pub output_mode: OutputMode,
    pub working_dir: PathBuf,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub verbose: bool,
}

impl ExecConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            output_mode: OutputMode::Human,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            session_id: None,
            model: None,
            verbose: false,
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = path.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_default() {
        assert_eq!(OutputMode::default(), OutputMode::Human);
    }

    #[test]
    fn test_output_mode_parse_variants() {
        assert_eq!(OutputMode::from_str("human").unwrap(), OutputMode::Human);
        assert_eq!(OutputMode::from_str("JSON").unwrap(), OutputMode::Json);
        assert_eq!(OutputMode::from_str("jsonl").unwrap(), OutputMode::Json);
        assert!(OutputMode::from_str("invalid").is_err());
    }

    #[test]
    fn test_exec_config_builder() {
        let config = ExecConfig::new("test")
            .with_output_mode(OutputMode::Json)
            .with_working_dir("/tmp")
            .with_session_id("test-session")
            .with_model("gpt-4o-mini")
            .with_verbose(true);

        assert_eq!(config.prompt, "test");
        assert_eq!(config.output_mode, OutputMode::Json);
        assert_eq!(config.working_dir, PathBuf::from("/tmp"));
        assert_eq!(config.session_id, Some("test-session".to_string()));
        assert_eq!(config.model, Some("gpt-4o-mini".to_string()));
        assert!(config.verbose);
    }
}
