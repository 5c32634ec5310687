//! The constitutional gate: the three checks every action passes through
//! before the Dreamer ever runs. `permitted` and the `block_*` family are
//! core-owned (§3), so this gate is the only place that reads them — no
//! autopoiesis-learned rule can shadow what it sees.

use nsk_kernel::{Kernel, Term};

use crate::action::ActionRequest;
use crate::error::DispatchError;

pub fn check_permitted(kernel: &Kernel, request: &ActionRequest) -> Result<(), DispatchError> {
    let permitted = kernel.symbols.intern("permitted");
    let kind_atom = kernel.symbols.intern(&request.kind);
    let allowed = kernel.query(permitted).into_iter().any(|f| {
        matches!(f.args.first(), Some(Term::Atom(a)) if *a == kind_atom)
    });
    if allowed {
        Ok(())
    } else {
        Err(DispatchError::PermissionDenied(request.kind.clone()))
    }
}

pub fn check_blocks(kernel: &Kernel) -> Result<(), DispatchError> {
    for blocker in ["block_commit", "block_refactor"] {
        let predicate = kernel.symbols.intern(blocker);
        if let Some(first) = kernel.query(predicate).into_iter().next() {
            let reason = match first.args.first() {
                Some(Term::Str(s)) => s.clone(),
                _ => format!("{blocker} is in effect"),
            };
            return Err(DispatchError::Blocked(reason));
        }
    }
    Ok(())
}
