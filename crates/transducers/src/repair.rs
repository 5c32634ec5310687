//! The malformed-output repair loop shared by Perception and Articulation.
//!
//! Both directions of the dual-channel protocol ask the LLM for a specific
//! shape and cannot proceed on anything else. Rather than duplicate a
//! call-parse-retry cycle in each transducer, both go through this one
//! bounded loop: call the model, try to parse, and on failure append a
//! single corrective note to the prompt before trying again.

use crate::error::{Error, Result};
use crate::llm::LlmClient;
use tracing::warn;

pub struct RepairOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Call `llm` up to `max_attempts` times, parsing the raw response with
/// `parse` each time. On every failure short of the last, append a repair
/// note built from the parse error before retrying.
pub async fn call_with_repair<T>(
    llm: &dyn LlmClient,
    system_prompt: &str,
    user_prompt: &str,
    max_attempts: u32,
    expected: &'static str,
    parse: impl Fn(&str) -> std::result::Result<T, String>,
) -> Result<RepairOutcome<T>> {
    let mut prompt = user_prompt.to_string();
    let mut last_raw = String::new();
    for attempt in 1..=max_attempts.max(1) {
        let raw = llm.complete(system_prompt, &prompt).await?;
        match parse(&raw) {
            Ok(value) => return Ok(RepairOutcome { value, attempts: attempt }),
            Err(parse_error) => {
                warn!(attempt, %parse_error, "transducer output failed to parse, repairing");
                last_raw = raw;
                prompt = format!(
                    "{user_prompt}\n\nYour previous reply could not be parsed as {expected}: {parse_error}\n\
                     Reply again with ONLY the requested {expected}, nothing else."
                );
            }
        }
    }
    Err(Error::Malformed { expected, raw: last_raw })
}
