//! Post-processing of raw vector store hits.
//!
//! Stores rank by their own notion of similarity; this service applies the
//! caller-facing policy on top: a score floor, lexical reranking, a recency
//! boost and diversification, then trims to the requested count.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::Utc;
use tracing::debug;

use crate::domain::models::{QueryResult, RetrievalConfig};
use crate::infrastructure::vector::memory_store::query_terms;

const STORE_SCORE_WEIGHT: f32 = 0.7;
const COVERAGE_WEIGHT: f32 = 0.3;
const RECENCY_BOOST: f64 = 0.1;
const RECENCY_DECAY_DAYS: f64 = 30.0;

/// Reranks, boosts and trims search results.
#[derive(Debug, Clone, Default)]
pub struct RetrievalService {
    config: RetrievalConfig,
}

impl RetrievalService {
    pub const fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Apply the configured pipeline to `results` and keep at most `top_k`.
    pub fn enhance(&self, query: &str, results: Vec<QueryResult>, top_k: usize) -> Vec<QueryResult> {
        let received = results.len();

        let mut results: Vec<QueryResult> = results
            .into_iter()
            .filter(|r| r.score >= self.config.min_score)
            .collect();

        if self.config.reranking {
            rerank(query, &mut results);
        }
        if self.config.boost_recent {
            boost_recent(&mut results);
        }

        sort_by_score(&mut results);

        let results = if self.config.diversity_factor > 0.0 {
            diversify(results, self.config.diversity_factor, top_k)
        } else {
            let mut results = results;
            results.truncate(top_k);
            results
        };

        debug!(received, returned = results.len(), "results enhanced");
        results
    }
}

fn sort_by_score(results: &mut [QueryResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Blend each score with the fraction of query terms the chunk contains.
fn rerank(query: &str, results: &mut [QueryResult]) {
    let terms = query_terms(query);
    if terms.is_empty() {
        return;
    }

    for result in results.iter_mut() {
        let haystack = format!(
            "{} {}",
            result.document.content.to_lowercase(),
            result.document.metadata.searchable_text()
        );
        let covered = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        let coverage = covered as f32 / terms.len() as f32;
        result.score = STORE_SCORE_WEIGHT.mul_add(result.score, COVERAGE_WEIGHT * coverage);
    }
}

/// Multiply scores by up to 1.1, decaying with a 30-day time constant.
fn boost_recent(results: &mut [QueryResult]) {
    let now = Utc::now();
    for result in results.iter_mut() {
        if let Some(timestamp) = result.document.metadata.timestamp() {
            let age_days = ((now - timestamp).num_seconds().max(0) as f64) / 86_400.0;
            let boost = RECENCY_BOOST.mul_add((-age_days / RECENCY_DECAY_DAYS).exp(), 1.0);
            result.score = (f64::from(result.score) * boost) as f32;
        }
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Greedy maximal-marginal-relevance selection over score-sorted `results`.
fn diversify(results: Vec<QueryResult>, factor: f32, top_k: usize) -> Vec<QueryResult> {
    let words: Vec<HashSet<String>> = results.iter().map(|r| word_set(&r.document.content)).collect();
    let mut remaining: Vec<usize> = (0..results.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(top_k.min(results.len()));

    while selected.len() < top_k && !remaining.is_empty() {
        let mut best_position = 0;
        let mut best_value = f32::NEG_INFINITY;

        for (position, &candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&chosen| jaccard(&words[candidate], &words[chosen]))
                .fold(0.0_f32, f32::max);
            let value = factor.mul_add(-redundancy, results[candidate].score);
            if value > best_value {
                best_value = value;
                best_position = position;
            }
        }

        selected.push(remaining.remove(best_position));
    }

    let mut slots: Vec<Option<QueryResult>> = results.into_iter().map(Some).collect();
    selected
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::models::{Document, DocumentMetadata};

    fn hit(id: &str, content: &str, score: f32) -> QueryResult {
        QueryResult::new(Document::new(id, content, DocumentMetadata::new(id)), score)
    }

    fn plain(config: RetrievalConfig) -> RetrievalService {
        RetrievalService::new(RetrievalConfig {
            reranking: false,
            ..config
        })
    }

    #[test]
    fn test_min_score_and_truncation() {
        let service = plain(RetrievalConfig {
            min_score: 0.3,
            ..RetrievalConfig::default()
        });
        let results = vec![
            hit("a", "alpha", 0.9),
            hit("b", "beta", 0.2),
            hit("c", "gamma", 0.5),
            hit("d", "delta", 0.4),
        ];

        let enhanced = service.enhance("anything", results, 2);
        let ids: Vec<&str> = enhanced.iter().map(QueryResult::id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_rerank_rewards_term_coverage() {
        let service = RetrievalService::new(RetrievalConfig::default());
        let results = vec![
            hit("vague", "nothing relevant here", 0.8),
            hit("exact", "rust ownership explained", 0.7),
        ];

        let enhanced = service.enhance("rust ownership", results, 5);
        assert_eq!(enhanced[0].id(), "exact");
        // 0.7 * 0.7 + 0.3 * 1.0
        assert!((enhanced[0].score - 0.79).abs() < 1e-5);
        assert!((enhanced[1].score - 0.56).abs() < 1e-5);
    }

    #[test]
    fn test_recent_documents_are_boosted() {
        let service = plain(RetrievalConfig {
            boost_recent: true,
            ..RetrievalConfig::default()
        });

        let mut fresh = hit("fresh", "same text", 0.5);
        fresh.document.metadata.updated_at = Some(Utc::now());
        let mut stale = hit("stale", "same text", 0.5);
        stale.document.metadata.created_at = Some(Utc::now() - Duration::days(365));

        let enhanced = service.enhance("text", vec![stale, fresh], 5);
        assert_eq!(enhanced[0].id(), "fresh");
        assert!((enhanced[0].score - 0.55).abs() < 1e-3);
        assert!(enhanced[1].score < 0.5001);
    }

    #[test]
    fn test_diversity_skips_near_duplicates() {
        let service = plain(RetrievalConfig {
            diversity_factor: 0.5,
            ..RetrievalConfig::default()
        });
        let results = vec![
            hit("a", "the quick brown fox jumps", 0.9),
            hit("a2", "the quick brown fox jumps", 0.85),
            hit("b", "completely different words entirely", 0.6),
        ];

        let enhanced = service.enhance("fox", results, 2);
        let ids: Vec<&str> = enhanced.iter().map(QueryResult::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_input() {
        let service = RetrievalService::default();
        assert!(service.enhance("query", Vec::new(), 5).is_empty());
    }
}
