//! The Effect Dispatcher: the single gate all side effects pass through.
//!
//! A `next_action` fact derived by the kernel never reaches the outside
//! world directly — it is routed through [`Dispatcher::route_action`],
//! which checks `permitted`/`block_*` (core-owned, un-overridable), then
//! runs the [`Dreamer`] to simulate the action's projected effects before
//! ever performing it, and only then hands it to the registered
//! [`EffectHandler`]. [`Dispatcher::get_facts`] is the matching read path:
//! virtual predicates (`file_content`, `shell_exec_result`, ...) are
//! resolved lazily through a [`VirtualPredicate`] rather than stored.

pub mod action;
pub mod dispatcher;
pub mod dreamer;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod policy;
pub mod registry;

pub use action::{ActionRequest, EffectHandler, VirtualPredicate};
pub use dispatcher::{Dispatcher, RouteOutcome};
pub use dreamer::{bootstrap_panic_rules, DreamResult, Dreamer};
pub use error::{DispatchError, Result};
pub use policy::{DangerousPattern, DangerousPatterns, ProtectedPrefixes};
pub use registry::EffectRegistry;
