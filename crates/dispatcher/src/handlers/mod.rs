//! Concrete effect handlers behind the dispatcher gate. Each implements
//! `EffectHandler` for one action kind and is wired into the
//! `EffectRegistry` at construction time; nothing outside this module ever
//! touches the filesystem, a subprocess, or a git repository directly.

pub mod fs;
pub mod git;
pub mod shell;
