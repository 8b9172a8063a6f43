//! Embedding similarity matcher.
//!
//! The user message is embedded through an [`EmbeddingProvider`] and compared
//! against a precomputed [`EmbeddingIndex`] of canned answers. The best entry
//! is returned only when its score reaches the configured threshold. Every
//! failure (provider down, empty index, wrong dimensions) is logged and turned
//! into "no answer".

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ReplyError, Result};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Anything that can turn text into a vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible `/v1/embeddings` endpoints.
///
/// One request per call: no retry, the client timeout is the only deadline.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Api { status, body });
        }

        let parsed: EmbedResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or(ReplyError::EmptyEmbedding)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// How query and template vectors are scored against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    /// Plain dot product, for providers that return unit vectors.
    Dot,
}

impl SimilarityMetric {
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Dot => dot(a, b) as f32,
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::Dot => f.write_str("dot"),
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = ReplyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            other => Err(ReplyError::InvalidData(format!(
                "unknown similarity metric: {other}"
            ))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

/// Cosine similarity; 0.0 when either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot(a, b) / (norm_a * norm_b)) as f32
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// A canned answer and its precomputed vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub answer: String,
    pub embedding: Vec<f32>,
}

/// Read-only set of template vectors, all of the same dimension.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

#[derive(Deserialize)]
struct IndexFile {
    entries: Vec<IndexEntry>,
}

impl EmbeddingIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimensions = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
        for entry in &entries {
            if entry.embedding.len() != dimensions || dimensions == 0 {
                return Err(ReplyError::DimensionMismatch {
                    expected: dimensions,
                    actual: entry.embedding.len(),
                });
            }
        }
        Ok(Self {
            entries,
            dimensions,
        })
    }

    /// Parse a `{ "entries": [{ "answer", "embedding" }] }` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: IndexFile = serde_json::from_str(json)?;
        Self::new(file.entries)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Highest-scoring entry. Earlier entries win ties; NaN and infinite
    /// scores never match.
    pub fn nearest(&self, query: &[f32], metric: SimilarityMetric) -> Option<(&IndexEntry, f32)> {
        let mut best: Option<(&IndexEntry, f32)> = None;
        for entry in &self.entries {
            let score = metric.score(query, &entry.embedding);
            if !score.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// A confident embedding hit.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatch {
    pub answer: String,
    pub score: f32,
}

#[derive(Clone)]
pub struct EmbeddingMatcher {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<EmbeddingIndex>,
    threshold: f32,
    metric: SimilarityMetric,
}

impl EmbeddingMatcher {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<EmbeddingIndex>,
        threshold: f32,
        metric: SimilarityMetric,
    ) -> Self {
        Self {
            provider,
            index,
            threshold,
            metric,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Best index entry scoring at least the threshold, if any.
    pub async fn find(&self, message: &str) -> Option<EmbeddingMatch> {
        if self.index.is_empty() {
            debug!("embedding index is empty, skipping");
            return None;
        }

        let query = match self.provider.embed(message).await {
            Ok(v) => v,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "embedding request failed");
                return None;
            }
        };

        if query.len() != self.index.dimensions() {
            warn!(
                expected = self.index.dimensions(),
                actual = query.len(),
                "embedding dimension mismatch"
            );
            return None;
        }

        let (entry, score) = self.index.nearest(&query, self.metric)?;
        if score < self.threshold {
            debug!(score, threshold = self.threshold, "best embedding match below threshold");
            return None;
        }

        debug!(score, metric = %self.metric, "embedding match");
        Some(EmbeddingMatch {
            answer: entry.answer.clone(),
            score,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider returning a fixed vector (or failing) and counting calls.
    pub(crate) struct FixedProvider {
        pub vector: Option<Vec<f32>>,
        pub calls: AtomicUsize,
    }

    impl FixedProvider {
        pub(crate) fn returning(vector: Vec<f32>) -> Self {
            Self {
                vector: Some(vector),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                vector: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vector.clone().ok_or(ReplyError::Api {
                status: 503,
                body: "unavailable".into(),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    pub(crate) fn sample_index() -> EmbeddingIndex {
        EmbeddingIndex::new(vec![
            IndexEntry {
                answer: "shipping answer".into(),
                embedding: vec![1.0, 0.0, 0.0],
            },
            IndexEntry {
                answer: "billing answer".into(),
                embedding: vec![0.0, 1.0, 0.0],
            },
        ])
        .unwrap()
    }

    fn matcher(provider: FixedProvider, threshold: f32) -> EmbeddingMatcher {
        EmbeddingMatcher::new(
            Arc::new(provider),
            Arc::new(sample_index()),
            threshold,
            SimilarityMetric::Cosine,
        )
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn dot_metric_is_unnormalized() {
        assert!((SimilarityMetric::Dot.score(&[2.0, 0.0], &[3.0, 0.0]) - 6.0).abs() < 1e-6);
        assert_eq!("DOT".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Dot);
        assert!("euclid".parse::<SimilarityMetric>().is_err());
    }

    #[test]
    fn index_rejects_mixed_dimensions() {
        let err = EmbeddingIndex::new(vec![
            IndexEntry {
                answer: "a".into(),
                embedding: vec![1.0, 0.0],
            },
            IndexEntry {
                answer: "b".into(),
                embedding: vec![1.0],
            },
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ReplyError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn index_parses_json() {
        let index = EmbeddingIndex::from_json_str(
            r#"{"entries":[{"answer":"a","embedding":[0.1,0.2]}]}"#,
        )
        .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.dimensions(), 2);
    }

    #[test]
    fn nearest_skips_non_finite_scores() {
        let index = EmbeddingIndex::new(vec![
            IndexEntry {
                answer: "corrupt".into(),
                embedding: vec![f32::NAN, 0.0, 0.0],
            },
            IndexEntry {
                answer: "billing answer".into(),
                embedding: vec![0.0, 1.0, 0.0],
            },
        ])
        .unwrap();

        let (entry, score) = index
            .nearest(&[0.0, 1.0, 0.0], SimilarityMetric::Dot)
            .unwrap();
        assert_eq!(entry.answer, "billing answer");
        assert!((score - 1.0).abs() < 1e-6);

        assert!(index
            .nearest(&[f32::NAN, 0.0, 0.0], SimilarityMetric::Cosine)
            .is_none());
    }

    #[tokio::test]
    async fn nan_query_is_never_accepted() {
        let m = matcher(FixedProvider::returning(vec![f32::NAN, 1.0, 0.0]), 0.78);
        assert!(m.find("garbled").await.is_none());
    }

    #[tokio::test]
    async fn returns_best_match_above_threshold() {
        let m = matcher(FixedProvider::returning(vec![0.9, 0.1, 0.0]), 0.78);
        let hit = m.find("where is my parcel").await.unwrap();
        assert_eq!(hit.answer, "shipping answer");
        assert!(hit.score >= 0.78);
    }

    #[tokio::test]
    async fn below_threshold_is_none() {
        let m = matcher(FixedProvider::returning(vec![0.5, 0.5, 0.7]), 0.78);
        assert!(m.find("something vague").await.is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_none() {
        let m = matcher(FixedProvider::failing(), 0.1);
        assert!(m.find("anything").await.is_none());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_none() {
        let m = matcher(FixedProvider::returning(vec![1.0, 0.0]), 0.1);
        assert!(m.find("anything").await.is_none());
    }

    #[tokio::test]
    async fn empty_index_skips_provider() {
        let provider = Arc::new(FixedProvider::returning(vec![1.0]));
        let m = EmbeddingMatcher::new(
            provider.clone(),
            Arc::new(EmbeddingIndex::default()),
            0.5,
            SimilarityMetric::Cosine,
        );
        assert!(m.find("hi").await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
