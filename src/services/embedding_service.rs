//! Embedding service for batch and real-time vector generation.
//!
//! Wraps an [`EmbeddingProvider`] with the policies callers rely on: bounded
//! concurrent batching, per-request timeouts, optional rate limiting, retry with
//! backoff, and fallback vectors when the backend is unavailable. Embedding never
//! fails for transient reasons; only a backend answering with the wrong
//! dimension is reported as an error.

use std::cmp::Ordering as CmpOrdering;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{EmbeddingConfig, FallbackVector};
use crate::domain::ports::EmbeddingProvider;
use crate::infrastructure::retry::RetryPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the embedding service.
#[derive(Debug, Clone)]
pub struct EmbeddingServiceConfig {
    /// Required vector length.
    pub dimension: usize,
    /// Texts per provider call.
    pub batch_size: usize,
    /// Provider calls in flight at once.
    pub max_concurrency: usize,
    /// Pause between waves of concurrent calls.
    pub batch_delay: Duration,
    /// Default retry count for [`EmbeddingService::embed_with_retry`].
    pub max_retries: u32,
    /// First retry delay, doubled on every attempt.
    pub retry_base_delay: Duration,
    /// Per-call timeout.
    pub request_timeout: Duration,
    /// Optional outbound rate cap.
    pub requests_per_second: Option<u32>,
    /// Vector served when the provider fails.
    pub fallback: FallbackVector,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default(), 768)
    }
}

impl EmbeddingServiceConfig {
    pub fn from_config(config: &EmbeddingConfig, dimension: usize) -> Self {
        Self {
            dimension,
            batch_size: config.batch_size.max(1),
            max_concurrency: config.max_concurrency.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            request_timeout: Duration::from_secs(config.timeout_secs),
            requests_per_second: config.requests_per_second,
            fallback: config.fallback,
        }
    }
}

/// Counters describing how embeddings were produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbeddingStats {
    pub provider: String,
    pub dimension: usize,
    /// Provider calls made.
    pub requests: u64,
    /// Provider calls that failed or timed out.
    pub failures: u64,
    /// Vectors served from the fallback policy instead of the provider.
    pub fallback_vectors: u64,
}

impl EmbeddingStats {
    /// Whether any result so far was produced without the backend.
    pub const fn is_degraded(&self) -> bool {
        self.fallback_vectors > 0
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    failures: AtomicU64,
    fallback_vectors: AtomicU64,
}

/// Embedding service that orchestrates embedding generation.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingServiceConfig,
    limiter: Option<DirectRateLimiter>,
    counters: Counters,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingServiceConfig) -> Self {
        let limiter = config
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Self {
            provider,
            config,
            limiter,
            counters: Counters::default(),
        }
    }

    /// Service using the provider's own dimension and default policies.
    pub fn with_defaults(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let config = EmbeddingServiceConfig {
            dimension: provider.dimension(),
            ..EmbeddingServiceConfig::default()
        };
        Self::new(provider, config)
    }

    /// Provider name for diagnostics.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Embedding dimension.
    pub const fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub const fn config(&self) -> &EmbeddingServiceConfig {
        &self.config
    }

    pub fn stats(&self) -> EmbeddingStats {
        EmbeddingStats {
            provider: self.provider.name().to_string(),
            dimension: self.config.dimension,
            requests: self.counters.requests.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            fallback_vectors: self.counters.fallback_vectors.load(Ordering::Relaxed),
        }
    }

    /// Embed a single text, serving the fallback vector if the provider fails.
    pub async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        match self.try_embed(text).await {
            Ok(vector) => Ok(vector),
            Err(err @ RagError::DimensionMismatch { .. }) => Err(err),
            Err(err) => {
                warn!(provider = self.provider.name(), error = %err, "embedding failed, using fallback vector");
                Ok(self.fallback_for(text))
            }
        }
    }

    /// Embed with up to `retries` retries and exponential backoff before falling back.
    pub async fn embed_with_retry(&self, text: &str, retries: u32) -> RagResult<Vec<f32>> {
        let base = u64::try_from(self.config.retry_base_delay.as_millis()).unwrap_or(u64::MAX);
        let policy = RetryPolicy::new(retries, base, base.saturating_mul(32));

        match policy.execute(|| self.try_embed(text)).await {
            Ok(vector) => Ok(vector),
            Err(err @ RagError::DimensionMismatch { .. }) => Err(err),
            Err(err) => {
                warn!(
                    provider = self.provider.name(),
                    retries,
                    error = %err,
                    "embedding failed after retries, using fallback vector"
                );
                Ok(self.fallback_for(text))
            }
        }
    }

    /// Embed many texts.
    ///
    /// Texts are split into sub-batches of `batch_size`, never more than the
    /// provider accepts in one request; at most `max_concurrency`
    /// sub-batches run at once, with `batch_delay` between waves. A failed
    /// sub-batch yields fallback vectors for its items, so the output always has
    /// one vector per input in input order.
    pub async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<&[String]> = texts.chunks(self.sub_batch_size()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for (wave, group) in batches.chunks(self.config.max_concurrency).enumerate() {
            if wave > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let results = join_all(group.iter().map(|batch| self.embed_sub_batch(batch))).await;
            for result in results {
                vectors.extend(result?);
            }
        }

        debug!(
            texts = texts.len(),
            batches = batches.len(),
            provider = self.provider.name(),
            "batch embedded"
        );
        Ok(vectors)
    }

    fn sub_batch_size(&self) -> usize {
        self.config
            .batch_size
            .min(self.provider.max_batch_size())
            .max(1)
    }

    async fn embed_sub_batch(&self, batch: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let result = self
            .call_provider(self.provider.embed_batch(batch))
            .await
            .and_then(|vectors| {
                if vectors.len() == batch.len() {
                    Ok(vectors)
                } else {
                    Err(RagError::Embedding(format!(
                        "provider returned {} vectors for {} inputs",
                        vectors.len(),
                        batch.len()
                    )))
                }
            });

        match result {
            Ok(vectors) => {
                for vector in &vectors {
                    self.check_dimension(vector)?;
                }
                Ok(vectors)
            }
            Err(err @ RagError::DimensionMismatch { .. }) => Err(err),
            Err(err) => {
                warn!(
                    provider = self.provider.name(),
                    items = batch.len(),
                    error = %err,
                    "sub-batch failed, using fallback vectors"
                );
                Ok(batch.iter().map(|text| self.fallback_for(text)).collect())
            }
        }
    }

    async fn try_embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let vector = self.call_provider(self.provider.embed(text)).await?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    /// Apply rate limiting and the request timeout to one provider call.
    async fn call_provider<T, Fut>(&self, call: Fut) -> RagResult<T>
    where
        Fut: Future<Output = RagResult<T>>,
    {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let result = match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout(self.config.request_timeout.as_secs())),
        };

        if result.is_err() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn check_dimension(&self, vector: &[f32]) -> RagResult<()> {
        if vector.len() == self.config.dimension {
            Ok(())
        } else {
            Err(RagError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            })
        }
    }

    fn fallback_for(&self, text: &str) -> Vec<f32> {
        self.counters.fallback_vectors.fetch_add(1, Ordering::Relaxed);
        match self.config.fallback {
            FallbackVector::Zero => vec![0.0; self.config.dimension],
            FallbackVector::HashSeeded => hash_seeded_vector(text, self.config.dimension),
        }
    }

    /// Cosine similarity of two vectors; 0 when either has zero norm.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> RagResult<f32> {
        if a.len() != b.len() {
            return Err(RagError::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }

        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm_a * norm_b))
    }

    /// Score every candidate against `query` and keep the `top_k` best.
    pub fn find_similar<T: Clone>(
        query: &[f32],
        candidates: &[(T, Vec<f32>)],
        top_k: usize,
    ) -> RagResult<Vec<(T, f32)>> {
        let mut scored = candidates
            .iter()
            .map(|(item, vector)| -> RagResult<(T, f32)> {
                Ok((item.clone(), Self::cosine_similarity(query, vector)?))
            })
            .collect::<RagResult<Vec<_>>>()?;

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(CmpOrdering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Deterministic unit vector derived from the text (FNV-1a seed, xorshift stream).
fn hash_seeded_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut state = text.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    });
    if state == 0 {
        state = 0x9e37_79b9_7f4a_7c15;
    }

    let mut vector: Vec<f32> = (0..dimension)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state >> 40) as f32 / (1u64 << 24) as f32).mul_add(2.0, -1.0)
        })
        .collect();

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::null_embedding::NullEmbeddingProvider;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Provider that fails every batch containing the marker text
    struct MockEmbeddingProvider {
        dimension: usize,
        max_batch: usize,
        calls: AtomicUsize,
    }

    impl MockEmbeddingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                max_batch: 16,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_max_batch(mut self, max_batch: usize) -> Self {
            self.max_batch = max_batch;
            self
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0; self.dimension];
            v[0] = text.len() as f32;
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(RagError::Embedding("backend unavailable".to_string()));
            }
            Ok(self.vector_for(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t.contains("FAIL")) {
                return Err(RagError::Embedding("backend unavailable".to_string()));
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }

        fn max_batch_size(&self) -> usize {
            self.max_batch
        }
    }

    fn fast_config(dimension: usize) -> EmbeddingServiceConfig {
        EmbeddingServiceConfig {
            dimension,
            batch_delay: Duration::from_millis(1),
            retry_base_delay: Duration::from_millis(1),
            ..EmbeddingServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_embed_null_provider() {
        let service = EmbeddingService::with_defaults(Arc::new(NullEmbeddingProvider::new(4)));
        assert_eq!(service.embed("test text").await.unwrap(), vec![0.0; 4]);
        assert!(service.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_failure_serves_zero_vector() {
        let service = EmbeddingService::new(Arc::new(MockEmbeddingProvider::new(3)), fast_config(3));
        let vector = service.embed("please FAIL").await.unwrap();
        assert_eq!(vector, vec![0.0; 3]);

        let stats = service.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.fallback_vectors, 1);
        assert!(stats.is_degraded());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_surfaced() {
        let service = EmbeddingService::new(Arc::new(MockEmbeddingProvider::new(3)), fast_config(5));
        assert!(matches!(
            service.embed("hello").await,
            Err(RagError::DimensionMismatch { expected: 5, actual: 3 })
        ));
        assert!(service.embed_batch(&["a".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_batch_preserves_positions_when_sub_batch_fails() {
        let provider = Arc::new(MockEmbeddingProvider::new(2));
        let service = EmbeddingService::new(provider.clone(), fast_config(2));

        let texts: Vec<String> = ["a", "bb", "ccc", "FAIL", "eeeee", "ffffff", "g"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let vectors = service.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), texts.len());
        // The first sub-batch (items 0..4) contains the failing text
        for vector in &vectors[..4] {
            assert_eq!(vector, &vec![0.0, 0.0]);
        }
        assert_eq!(vectors[4][0], 5.0);
        assert_eq!(vectors[5][0], 6.0);
        assert_eq!(vectors[6][0], 1.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.stats().fallback_vectors, 4);
    }

    #[tokio::test]
    async fn test_sub_batches_respect_provider_limit() {
        let provider = Arc::new(MockEmbeddingProvider::new(2).with_max_batch(2));
        let service = EmbeddingService::new(provider.clone(), fast_config(2));
        assert_eq!(service.config().batch_size, 4);

        let texts: Vec<String> = (0..5).map(|i| "x".repeat(i + 1)).collect();
        let vectors = service.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(vectors[4][0], 5.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_embed_with_retry_falls_back() {
        let provider = Arc::new(MockEmbeddingProvider::new(2));
        let service = EmbeddingService::new(provider.clone(), fast_config(2));

        let vector = service.embed_with_retry("FAIL", 2).await.unwrap();
        assert_eq!(vector, vec![0.0, 0.0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        let vector = service.embed_with_retry("ok", 2).await.unwrap();
        assert_eq!(vector[0], 2.0);
    }

    #[tokio::test]
    async fn test_hash_seeded_fallback_is_deterministic_unit_vector() {
        let config = EmbeddingServiceConfig {
            fallback: FallbackVector::HashSeeded,
            ..fast_config(16)
        };
        let service = EmbeddingService::new(Arc::new(MockEmbeddingProvider::new(16)), config);

        let a = service.embed("FAIL one").await.unwrap();
        let b = service.embed("FAIL one").await.unwrap();
        let c = service.embed("FAIL two").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity() {
        let sim = |a: &[f32], b: &[f32]| EmbeddingService::cosine_similarity(a, b).unwrap();
        assert!((sim(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(sim(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((sim(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
        assert_eq!(sim(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!(EmbeddingService::cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_find_similar_orders_and_truncates() {
        let candidates = vec![
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.1]),
            ("exact", vec![1.0, 0.0]),
        ];
        let top = EmbeddingService::find_similar(&[1.0, 0.0], &candidates, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "exact");
        assert_eq!(top[1].0, "near");
    }
}
