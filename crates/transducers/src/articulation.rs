//! Articulation Transducer: the Piggyback protocol.
//!
//! The LLM's reply must be dual-channel — a user-visible surface response
//! plus a structured control packet of logical updates — and every control
//! packet is filtered through `permitted`/`block_*` queries and the
//! core-owned predicate set before anything in it touches the kernel.

use nsk_kernel::{parser, Fact, Kernel};
use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::llm::LlmClient;
use crate::repair::call_with_repair;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ControlPacket {
    #[serde(default)]
    pub intent_classification: Option<serde_json::Value>,
    #[serde(default)]
    pub mangle_updates: Vec<String>,
    #[serde(default)]
    pub memory_operations: Option<serde_json::Value>,
    #[serde(default)]
    pub self_correction: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DualChannelReply {
    pub surface_response: String,
    #[serde(default)]
    pub control_packet: ControlPacket,
}

/// One accepted or rejected mangle update, reported back to the caller for
/// inclusion in the trace log — a rejected update is not a transducer
/// failure, it is the constitutional gate working as intended.
#[derive(Debug, Clone)]
pub enum MangleOutcome {
    Asserted(Fact),
    Retracted(Fact),
    Rejected { text: String, reason: String },
}

pub struct ApplyResult {
    pub surface_response: String,
    pub outcomes: Vec<MangleOutcome>,
}

pub struct ArticulationTransducer {
    llm: std::sync::Arc<dyn LlmClient>,
    max_repair_attempts: u32,
    max_response_bytes: usize,
}

impl ArticulationTransducer {
    pub fn new(llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_repair_attempts: 1,
            max_response_bytes: 64 * 1024,
        }
    }

    pub fn with_max_repair_attempts(mut self, n: u32) -> Self {
        self.max_repair_attempts = n;
        self
    }

    pub fn with_max_response_bytes(mut self, n: usize) -> Self {
        self.max_response_bytes = n;
        self
    }

    /// Ask the LLM for a dual-channel reply given `system_prompt` (the
    /// JIT-assembled prompt, already carrying the protocol directive) and
    /// `user_prompt` (the compiled turn context).
    pub async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<DualChannelReply> {
        let max_len = self.max_response_bytes;
        let outcome = call_with_repair(
            self.llm.as_ref(),
            system_prompt,
            user_prompt,
            self.max_repair_attempts.max(1),
            "a dual-channel {surface_response, control_packet} JSON object",
            move |raw| parse_dual_channel_reply(raw, max_len),
        )
        .await?;
        Ok(outcome.value)
    }

    /// Apply a reply's control packet to `kernel`, gating every assertion
    /// and retraction through `permitted`/`block_*` and through the schema's
    /// core-owned set. Returns the (possibly policy-rewritten) surface
    /// response alongside a per-update outcome trail.
    pub fn apply(&self, kernel: &mut Kernel, reply: &DualChannelReply) -> Result<ApplyResult> {
        let mut outcomes = Vec::with_capacity(reply.control_packet.mangle_updates.len());

        for text in &reply.control_packet.mangle_updates {
            match self.apply_one(kernel, text) {
                Ok(outcome) => outcomes.push(outcome),
                Err(reason) => {
                    warn!(update = %text, %reason, "control packet update rejected");
                    outcomes.push(MangleOutcome::Rejected {
                        text: text.clone(),
                        reason,
                    });
                }
            }
        }

        let surface_response = if self.response_violates_policy(kernel) {
            "I can't complete that as described; let me know if you'd like to proceed differently.".to_string()
        } else {
            reply.surface_response.clone()
        };

        Ok(ApplyResult {
            surface_response,
            outcomes,
        })
    }

    fn apply_one(&self, kernel: &mut Kernel, text: &str) -> std::result::Result<MangleOutcome, String> {
        let (retract, fact_text) = match text.trim().strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, text.trim()),
        };

        let statements = parser::parse_program(fact_text, &kernel.symbols).map_err(|e| e.to_string())?;
        let fact = match statements.as_slice() {
            [nsk_kernel::parser::Statement::Fact(f)] => f.clone(),
            _ => return Err("mangle update must be a single ground fact".to_string()),
        };

        if kernel.schema().is_core_owned(fact.predicate) {
            return Err(format!(
                "{} is core-owned and cannot be written by a control packet",
                kernel.symbols.resolve(fact.predicate)
            ));
        }

        if !self.is_permitted(kernel, &fact) {
            return Err(format!(
                "{} is blocked by the constitutional gate",
                kernel.symbols.resolve(fact.predicate)
            ));
        }

        if retract {
            kernel.retract_fact(&fact);
            Ok(MangleOutcome::Retracted(fact))
        } else {
            kernel.assert(fact.clone()).map_err(|e| e.to_string())?;
            Ok(MangleOutcome::Asserted(fact))
        }
    }

    /// A write is permitted unless the kernel derives a matching `block_*`
    /// fact naming this predicate. Absence of any `block_*` fact for a
    /// predicate defaults to allowed: the constitutional gate is opt-in
    /// denial, not opt-in allow, matching the schema's own default posture
    /// for non-core-owned predicates.
    fn is_permitted(&self, kernel: &Kernel, fact: &Fact) -> bool {
        let predicate_name = kernel.symbols.resolve(fact.predicate);
        let block_commit = kernel.symbols.intern("block_commit");
        let block_refactor = kernel.symbols.intern("block_refactor");
        for blocker in [block_commit, block_refactor] {
            for blocked in kernel.query(blocker) {
                if let Some(nsk_kernel::Term::Atom(a)) = blocked.args.first() {
                    if *kernel.symbols.resolve(*a) == *predicate_name {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn response_violates_policy(&self, kernel: &Kernel) -> bool {
        let predicate = kernel.symbols.intern("response_violates_policy");
        !kernel.query(predicate).is_empty()
    }
}

fn parse_dual_channel_reply(raw: &str, max_len: usize) -> std::result::Result<DualChannelReply, String> {
    if raw.len() > max_len {
        return Err(format!("response exceeded {max_len} bytes"));
    }
    if std::str::from_utf8(raw.as_bytes()).is_err() {
        return Err("response was not valid UTF-8".to_string());
    }
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```");
    serde_json::from_str(trimmed.trim()).map_err(|e| e.to_string())
}
