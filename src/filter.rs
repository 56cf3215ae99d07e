//! Post-retrieval context filtering and reranking.
//!
//! Decides which retrieved chunks survive into the prompt context. Four
//! interchangeable strategies share one contract: given ranked candidates,
//! return the kept chunks plus a [`FilterDecision`] audit record for every
//! candidate. The audit trail is a hard requirement, consumed by the
//! surrounding service's comparison and debug surfaces.
//!
//! The reranker strategy asks the injected [`TextGenerator`] to score each
//! candidate and parses a structured JSON verdict. Any failure there —
//! call error, timeout, unparseable or inconsistent response — degrades to
//! threshold filtering instead of failing the request; the
//! [`FilterOutcome`] variant tells callers which path was taken.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::{Result, RetrievalError};
use crate::models::{FilterDecision, SearchResult};
use crate::providers::TextGenerator;

/// Which post-retrieval filter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrategy {
    /// Keep everything.
    #[default]
    None,
    /// Keep chunks at or above the similarity floor, optionally capped.
    Threshold,
    /// Model-scored relevance verdicts; threshold fallback on failure.
    Reranker,
    /// Threshold first, then rerank only the survivors.
    Hybrid,
}

/// Kept chunks plus the per-candidate audit trail.
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    pub kept: Vec<SearchResult>,
    pub decisions: Vec<FilterDecision>,
}

/// Distinguishes a clean strategy run from a reranker fallback.
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    /// The configured strategy ran to completion.
    Clean(FilterResult),
    /// The reranker failed; threshold filtering was applied instead.
    /// Carries the failure description.
    Degraded(FilterResult, String),
}

impl FilterOutcome {
    pub fn result(&self) -> &FilterResult {
        match self {
            FilterOutcome::Clean(r) | FilterOutcome::Degraded(r, _) => r,
        }
    }

    pub fn into_result(self) -> FilterResult {
        match self {
            FilterOutcome::Clean(r) | FilterOutcome::Degraded(r, _) => r,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FilterOutcome::Degraded(..))
    }
}

const RERANK_SYSTEM_PROMPT: &str =
    "You score retrieved text passages for relevance to a user question. Respond with JSON only.";

/// A single per-passage verdict from the reranking model.
#[derive(Debug, Clone, Deserialize)]
struct RerankVerdict {
    index: usize,
    score: f32,
    #[serde(rename = "use")]
    should_use: bool,
    #[serde(default)]
    reason: String,
}

/// Context filter over ranked search results.
pub struct ContextFilter {
    config: EngineConfig,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ContextFilter {
    /// The generator is only needed by the `reranker` and `hybrid`
    /// strategies; passing `None` makes those degrade to threshold.
    pub fn new(config: EngineConfig, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { config, generator }
    }

    /// Run the configured strategy over `candidates` (expected in ranked
    /// order, best first).
    pub async fn filter(&self, query: &str, candidates: Vec<SearchResult>) -> FilterOutcome {
        match self.config.filter_strategy {
            FilterStrategy::None => FilterOutcome::Clean(passthrough(candidates)),
            FilterStrategy::Threshold => {
                let mut decisions = Vec::new();
                let kept = self.threshold_cut(candidates, &mut decisions, true);
                FilterOutcome::Clean(FilterResult { kept, decisions })
            }
            FilterStrategy::Reranker => {
                self.rerank_or_fallback(query, candidates, Vec::new()).await
            }
            FilterStrategy::Hybrid => {
                // Cheap cut first so the reranking call sees a bounded set.
                let mut decisions = Vec::new();
                let survivors = self.threshold_cut(candidates, &mut decisions, false);
                self.rerank_or_fallback(query, survivors, decisions).await
            }
        }
    }

    /// Threshold pass. Records a decision for every dropped candidate;
    /// kept candidates are recorded only when `record_kept` is set (the
    /// hybrid path leaves the kept verdicts to the reranker).
    fn threshold_cut(
        &self,
        candidates: Vec<SearchResult>,
        decisions: &mut Vec<FilterDecision>,
        record_kept: bool,
    ) -> Vec<SearchResult> {
        let min = self.config.min_similarity;
        let cap = self.config.keep_top.unwrap_or(usize::MAX);
        let mut kept = Vec::new();

        for candidate in candidates {
            if candidate.similarity < min {
                decisions.push(FilterDecision {
                    chunk_id: candidate.chunk_id.clone(),
                    kept: false,
                    score: candidate.similarity,
                    reason: format!(
                        "similarity {:.3} below threshold {:.3}",
                        candidate.similarity, min
                    ),
                });
            } else if kept.len() >= cap {
                decisions.push(FilterDecision {
                    chunk_id: candidate.chunk_id.clone(),
                    kept: false,
                    score: candidate.similarity,
                    reason: format!("keep_top cap of {} reached", cap),
                });
            } else {
                if record_kept {
                    decisions.push(FilterDecision {
                        chunk_id: candidate.chunk_id.clone(),
                        kept: true,
                        score: candidate.similarity,
                        reason: format!(
                            "similarity {:.3} meets threshold {:.3}",
                            candidate.similarity, min
                        ),
                    });
                }
                kept.push(candidate);
            }
        }

        kept
    }

    async fn rerank_or_fallback(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        mut prior: Vec<FilterDecision>,
    ) -> FilterOutcome {
        if candidates.is_empty() {
            return FilterOutcome::Clean(FilterResult {
                kept: Vec::new(),
                decisions: prior,
            });
        }

        match self.rerank(query, &candidates).await {
            Ok(mut result) => {
                prior.append(&mut result.decisions);
                FilterOutcome::Clean(FilterResult {
                    kept: result.kept,
                    decisions: prior,
                })
            }
            Err(err) => {
                warn!(error = %err, "reranker failed, falling back to threshold filtering");
                let mut decisions = prior;
                let kept = self.threshold_cut(candidates, &mut decisions, true);
                FilterOutcome::Degraded(FilterResult { kept, decisions }, err.to_string())
            }
        }
    }

    async fn rerank(&self, query: &str, candidates: &[SearchResult]) -> Result<FilterResult> {
        let generator = self.generator.as_deref().ok_or_else(|| {
            RetrievalError::Rerank("no text generator configured".to_string())
        })?;

        let prompt = build_rerank_prompt(query, candidates);
        let generation = timeout(
            self.config.rerank_timeout(),
            generator.generate(&prompt, Some(RERANK_SYSTEM_PROMPT)),
        )
        .await
        .map_err(|_| {
            RetrievalError::Rerank(format!(
                "rerank timed out after {}s",
                self.config.rerank_timeout_secs
            ))
        })?
        .map_err(|e| RetrievalError::Rerank(e.to_string()))?;

        let verdicts = parse_rerank_response(&generation.text, candidates.len())?;

        let mut selected: Vec<&RerankVerdict> =
            verdicts.iter().filter(|v| v.should_use).collect();
        selected.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        selected.truncate(self.config.reranker_max_chunks);

        let keep_indices: HashSet<usize> = selected.iter().map(|v| v.index).collect();
        let kept: Vec<SearchResult> = selected
            .iter()
            .map(|v| candidates[v.index].clone())
            .collect();

        let by_index: HashMap<usize, &RerankVerdict> =
            verdicts.iter().map(|v| (v.index, v)).collect();

        let mut decisions = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            let decision = match by_index.get(&i) {
                Some(v) if keep_indices.contains(&i) => FilterDecision {
                    chunk_id: candidate.chunk_id.clone(),
                    kept: true,
                    score: v.score,
                    reason: if v.reason.is_empty() {
                        format!("reranker score {:.2}", v.score)
                    } else {
                        v.reason.clone()
                    },
                },
                Some(v) if v.should_use => FilterDecision {
                    chunk_id: candidate.chunk_id.clone(),
                    kept: false,
                    score: v.score,
                    reason: format!(
                        "reranker cap of {} reached",
                        self.config.reranker_max_chunks
                    ),
                },
                Some(v) => FilterDecision {
                    chunk_id: candidate.chunk_id.clone(),
                    kept: false,
                    score: v.score,
                    reason: if v.reason.is_empty() {
                        "reranker score too low".to_string()
                    } else {
                        v.reason.clone()
                    },
                },
                None => FilterDecision {
                    chunk_id: candidate.chunk_id.clone(),
                    kept: false,
                    score: candidate.similarity,
                    reason: "not scored by reranker".to_string(),
                },
            };
            decisions.push(decision);
        }

        Ok(FilterResult { kept, decisions })
    }
}

/// Keep everything, with an audit entry per candidate.
fn passthrough(candidates: Vec<SearchResult>) -> FilterResult {
    let decisions = candidates
        .iter()
        .map(|c| FilterDecision {
            chunk_id: c.chunk_id.clone(),
            kept: true,
            score: c.similarity,
            reason: "passthrough".to_string(),
        })
        .collect();
    FilterResult {
        kept: candidates,
        decisions,
    }
}

fn build_rerank_prompt(query: &str, candidates: &[SearchResult]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Score each passage for relevance to the question.\n\n");
    prompt.push_str(&format!("Question: {}\n\nPassages:\n", query));
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n\n", i, candidate.content));
    }
    prompt.push_str(
        "Respond with a JSON array, one object per passage: \
         [{\"index\": 0, \"score\": 0.0, \"use\": false, \"reason\": \"short justification\"}, ...]",
    );
    prompt
}

/// Extract and validate the JSON verdict array from the model response.
///
/// Tolerates prose around the array (everything outside the outermost
/// brackets is ignored) but rejects out-of-range or duplicate indices so
/// an inconsistent response triggers the threshold fallback.
fn parse_rerank_response(text: &str, candidate_count: usize) -> Result<Vec<RerankVerdict>> {
    let start = text
        .find('[')
        .ok_or_else(|| RetrievalError::Rerank("no JSON array in reranker response".to_string()))?;
    let end = text
        .rfind(']')
        .filter(|&e| e > start)
        .ok_or_else(|| RetrievalError::Rerank("unterminated JSON array in reranker response".to_string()))?;

    let verdicts: Vec<RerankVerdict> = serde_json::from_str(&text[start..=end])
        .map_err(|e| RetrievalError::Rerank(format!("unparseable reranker response: {}", e)))?;

    let mut seen = HashSet::new();
    for v in &verdicts {
        if v.index >= candidate_count {
            return Err(RetrievalError::Rerank(format!(
                "reranker index {} out of range ({} candidates)",
                v.index, candidate_count
            )));
        }
        if !seen.insert(v.index) {
            return Err(RetrievalError::Rerank(format!(
                "duplicate reranker index {}",
                v.index
            )));
        }
    }

    Ok(verdicts)
}
