//! Perception Transducer: turns raw user text into the kernel's atoms.
//!
//! The transducer itself never fuzzy-matches anything — that would let it
//! silently override the kernel's own confidence bookkeeping. It asks the
//! LLM for a structured classification, asks a vector-similarity service for
//! candidate resolutions, and hands both to the kernel as plain facts. The
//! kernel, via rules, is the one that decides which `semantic_match` wins and
//! whether `focus_resolution` confidence clears the threshold.

use async_trait::async_trait;
use nsk_kernel::{Fact, Kernel, Term};
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::llm::LlmClient;
use crate::repair::call_with_repair;

/// The kernel only ever derives `clarification_needed` when the best
/// `focus_resolution` confidence falls below this. Transducer-level code does
/// not special-case it; the threshold lives here purely so that callers
/// building a `focus_resolution` fact from a similarity score have the same
/// number the rules will check.
pub const FOCUS_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// A single resolution candidate returned by the vector-similarity service
/// for one raw user reference (e.g. a fuzzy file or symbol mention).
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityCandidate {
    pub raw: String,
    pub resolved: String,
    pub symbol: String,
    pub confidence: f64,
}

/// External vector recall, injected so the transducer never embeds its own
/// notion of "close enough" — it only relays scores the kernel will judge.
#[async_trait]
pub trait VectorSimilarityService: Send + Sync {
    async fn resolve(&self, raw_reference: &str) -> Result<Vec<SimilarityCandidate>>;
}

/// A service that never finds anything, for callers with no fuzzy references
/// to resolve (slash commands, pure tool-result turns).
pub struct NullSimilarityService;

#[async_trait]
impl VectorSimilarityService for NullSimilarityService {
    async fn resolve(&self, _raw_reference: &str) -> Result<Vec<SimilarityCandidate>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, serde::Deserialize)]
struct IntentClassification {
    category: String,
    verb: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    constraint: Option<String>,
    #[serde(default)]
    focus_reference: Option<String>,
}

pub struct PerceptionTransducer {
    llm: Arc<dyn LlmClient>,
    similarity: Arc<dyn VectorSimilarityService>,
    max_repair_attempts: u32,
}

impl PerceptionTransducer {
    pub fn new(llm: Arc<dyn LlmClient>, similarity: Arc<dyn VectorSimilarityService>) -> Self {
        Self {
            llm,
            similarity,
            max_repair_attempts: 3,
        }
    }

    pub fn with_max_repair_attempts(mut self, n: u32) -> Self {
        self.max_repair_attempts = n;
        self
    }

    /// Classify `user_text` and resolve any fuzzy reference it names,
    /// returning the facts for the caller to assert. Never returns `Err` for
    /// a bad LLM reply: after the repair budget is exhausted this produces a
    /// single `perception_error` fact instead, per the turn's fallback
    /// contract. Kernel-level errors (type mismatches on intern, etc.) still
    /// propagate, since those indicate a bug rather than a flaky model.
    pub async fn transduce(&self, kernel: &Kernel, user_text: &str) -> Result<Vec<Fact>> {
        let system_prompt = PERCEPTION_SYSTEM_PROMPT;
        let user_prompt = format!(
            "Classify this user utterance as JSON with keys category, verb, target, constraint, \
             focus_reference (a short string naming anything fuzzy the user referred to, or null).\n\n\
             Utterance: {user_text}"
        );

        let outcome = call_with_repair(
            self.llm.as_ref(),
            system_prompt,
            &user_prompt,
            self.max_repair_attempts,
            "an intent classification JSON object",
            parse_intent_classification,
        )
        .await;

        let classification = match outcome {
            Ok(o) => o.value,
            Err(e) => {
                warn!(error = %e, %user_text, "perception exhausted repair budget");
                return Ok(vec![perception_error_fact(kernel, user_text)]);
            }
        };

        let mut facts = Vec::new();
        let intent_id = format!("intent-{}", uuid::Uuid::new_v4());
        facts.push(self.intent_fact(kernel, &intent_id, &classification));

        if let Some(reference) = classification.focus_reference.as_deref() {
            let candidates = self.similarity.resolve(reference).await?;
            for (rank, candidate) in candidates.iter().enumerate() {
                facts.push(self.semantic_match_fact(kernel, reference, candidate, rank));
            }
            if let Some(best) = candidates
                .iter()
                .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
            {
                facts.push(self.focus_resolution_fact(kernel, best));
            } else {
                facts.push(self.focus_resolution_fact(
                    kernel,
                    &SimilarityCandidate {
                        raw: reference.to_string(),
                        resolved: reference.to_string(),
                        symbol: reference.to_string(),
                        confidence: 0.0,
                    },
                ));
            }
        }

        Ok(facts)
    }

    fn intent_fact(&self, kernel: &Kernel, id: &str, c: &IntentClassification) -> Fact {
        let predicate = kernel.symbols.intern("intent");
        Fact::new(
            predicate,
            vec![
                Term::Str(id.to_string()),
                Term::Atom(kernel.symbols.intern(&c.category)),
                Term::Atom(kernel.symbols.intern(&c.verb)),
                c.target
                    .as_ref()
                    .map(|t| Term::Str(t.clone()))
                    .unwrap_or(Term::Bool(false)),
                c.constraint
                    .as_ref()
                    .map(|k| Term::Str(k.clone()))
                    .unwrap_or(Term::Bool(false)),
            ],
        )
    }

    fn semantic_match_fact(&self, kernel: &Kernel, input: &str, c: &SimilarityCandidate, rank: usize) -> Fact {
        let predicate = kernel.symbols.intern("semantic_match");
        Fact::new(
            predicate,
            vec![
                Term::Str(input.to_string()),
                Term::Str(c.resolved.clone()),
                Term::Atom(kernel.symbols.intern(&c.symbol)),
                Term::Int(rank as i64),
                Term::Float(c.confidence),
            ],
        )
    }

    fn focus_resolution_fact(&self, kernel: &Kernel, c: &SimilarityCandidate) -> Fact {
        let predicate = kernel.symbols.intern("focus_resolution");
        Fact::new(
            predicate,
            vec![
                Term::Str(c.raw.clone()),
                Term::Str(c.resolved.clone()),
                Term::Atom(kernel.symbols.intern(&c.symbol)),
                Term::Float(c.confidence),
            ],
        )
    }
}

fn perception_error_fact(kernel: &Kernel, user_text: &str) -> Fact {
    let predicate = kernel.symbols.intern("perception_error");
    Fact::new(predicate, vec![Term::Str(user_text.to_string())])
}

fn parse_intent_classification(raw: &str) -> std::result::Result<IntentClassification, String> {
    let trimmed = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    serde_json::from_str(trimmed.trim()).map_err(|e| e.to_string())
}

const PERCEPTION_SYSTEM_PROMPT: &str = "You classify user utterances for a logic-driven coding agent. \
Reply with ONLY a JSON object, no prose, no markdown fences.";
