//! Pre-main process hardening: disable core dumps, make the process
//! non-dumpable (blocks `ptrace` attach from unrelated processes), and
//! scrub secret-shaped environment variables before any other crate has a
//! chance to read them. Invoked from the `cli` binary via `#[ctor::ctor]`
//! so it runs before `main` and before any LLM client or handler reads the
//! environment.

use std::env;

/// Environment variable name fragments that mark a variable as
/// secret-shaped. Anything whose name contains one of these, case
/// insensitively, is removed from the current process's environment.
const SECRET_NAME_FRAGMENTS: &[&str] = &["SECRET", "TOKEN", "PASSWORD", "API_KEY", "PRIVATE_KEY"];

/// Run all hardening steps. Safe to call more than once; each step is
/// independently idempotent. Failures are logged to stderr rather than
/// propagated, since hardening that partially fails should not block the
/// process from starting.
pub fn pre_main_hardening() {
    disable_core_dumps();
    disable_ptrace_attach();
    scrub_secret_env_vars();
}

/// Set `RLIMIT_CORE` to zero so a crash never writes a core file that
/// could contain prompts, API keys, or source under edit.
#[cfg(unix)]
fn disable_core_dumps() {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, fully initialized `rlimit`; the call
    // cannot write through any pointer we don't own.
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
    if rc != 0 {
        eprintln!(
            "process-hardening: failed to disable core dumps: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn disable_core_dumps() {}

/// On Linux, mark the process non-dumpable so another process (other than
/// a direct parent with `CAP_SYS_PTRACE`) cannot `ptrace`-attach and read
/// its memory. A no-op on other platforms; there is no portable
/// equivalent.
#[cfg(target_os = "linux")]
fn disable_ptrace_attach() {
    // SAFETY: `PR_SET_DUMPABLE` takes no pointer arguments; `prctl` here
    // only flips a per-process flag in the kernel.
    let rc = unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) };
    if rc != 0 {
        eprintln!(
            "process-hardening: failed to set non-dumpable: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn disable_ptrace_attach() {}

/// Remove environment variables whose name looks like it holds a secret.
/// Catches credentials the parent shell exported for an unrelated tool
/// that would otherwise be visible to every shell command the dispatcher
/// spawns.
fn scrub_secret_env_vars() {
    let to_remove: Vec<String> = env::vars()
        .map(|(key, _)| key)
        .filter(|key| is_secret_shaped(key))
        .collect();

    for key in to_remove {
        env::remove_var(key);
    }
}

fn is_secret_shaped(key: &str) -> bool {
    if key == "OPENAI_API_KEY" {
        // The one credential this agent actually needs; scrubbing it
        // would break the LLM client that reads it at boot.
        return false;
    }
    let upper = key.to_ascii_uppercase();
    SECRET_NAME_FRAGMENTS
        .iter()
        .any(|fragment| upper.contains(fragment))
}
