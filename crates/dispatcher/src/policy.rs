//! Declared, not hardcoded, dispatcher policy data: protected path prefixes
//! and dangerous command patterns the Dreamer checks a candidate action
//! against before anything is dispatched.
//!
//! Grounded in the teacher's `core::safe_commands`/`core::sandbox_summary`
//! dangerous-command posture, reduced to a small declared-data table rather
//! than the teacher's shell-AST-driven classifier: the spec asks for
//! declared policy data the Dreamer can project against, not a full shell
//! parser.

use regex::Regex;
use std::path::Path;

/// Directory prefixes the Dreamer treats as a `critical_path_hit` no matter
/// what action touches them: kernel schema/policy files, the agent's own
/// state directory, and VCS metadata.
#[derive(Clone, Debug)]
pub struct ProtectedPrefixes {
    pub prefixes: Vec<String>,
}

impl Default for ProtectedPrefixes {
    fn default() -> Self {
        Self {
            prefixes: vec![
                ".git".to_string(),
                ".neurokernel".to_string(),
                "policy".to_string(),
                "schema".to_string(),
            ],
        }
    }
}

impl ProtectedPrefixes {
    pub fn hits(&self, path: &str) -> bool {
        let normalized = Path::new(path);
        self.prefixes.iter().any(|prefix| {
            normalized
                .components()
                .any(|c| c.as_os_str() == prefix.as_str())
        })
    }
}

/// A single named dangerous-command pattern. `pattern` is a regex matched
/// against the whole command line.
#[derive(Clone, Debug)]
pub struct DangerousPattern {
    pub name: &'static str,
    pub pattern: Regex,
}

#[derive(Clone)]
pub struct DangerousPatterns {
    pub patterns: Vec<DangerousPattern>,
}

impl DangerousPatterns {
    /// The minimum set the spec requires: recursive deletion, forced VCS
    /// resets, destructive infrastructure teardown, raw-device writes.
    pub fn default_set() -> Self {
        let compile = |name: &'static str, re: &str| DangerousPattern {
            name,
            pattern: Regex::new(re).expect("static dangerous-pattern regex is well-formed"),
        };
        Self {
            patterns: vec![
                compile("recursive_delete", r"rm\s+(-\w*r\w*f\w*|-\w*f\w*r\w*|--recursive.*--force|--force.*--recursive)"),
                compile("forced_vcs_reset", r"git\s+(reset\s+--hard|clean\s+-\w*f\w*d|push\s+.*--force)"),
                compile("infra_teardown", r"(terraform\s+destroy|kubectl\s+delete\s+(namespace|node)|docker\s+system\s+prune)"),
                compile("raw_device_write", r"dd\s+.*of=/dev/|>\s*/dev/sd[a-z]"),
            ],
        }
    }

    pub fn first_match(&self, command: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|p| p.pattern.is_match(command))
            .map(|p| p.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_prefix_matches_git_dir() {
        let p = ProtectedPrefixes::default();
        assert!(p.hits("repo/.git/config"));
        assert!(!p.hits("repo/src/main.rs"));
    }

    #[test]
    fn dangerous_pattern_catches_rm_rf() {
        let d = DangerousPatterns::default_set();
        assert_eq!(d.first_match("rm -rf /"), Some("recursive_delete"));
        assert_eq!(d.first_match("ls -la"), None);
    }

    #[test]
    fn dangerous_pattern_catches_forced_git_reset() {
        let d = DangerousPatterns::default_set();
        assert_eq!(d.first_match("git reset --hard origin/main"), Some("forced_vcs_reset"));
    }

    #[test]
    fn dangerous_pattern_catches_raw_device_write() {
        let d = DangerousPatterns::default_set();
        assert_eq!(d.first_match("dd if=/dev/zero of=/dev/sda"), Some("raw_device_write"));
    }
}
