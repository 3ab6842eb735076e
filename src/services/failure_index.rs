//! FailureIndex + ResolutionMatcher (C6): vectorizes failures, retains them
//! in a capped store, and matches new failures against old ones to suggest
//! resolutions, weighting match confidence with a Wilson-lower-bound
//! feedback term so cold resolutions default to a neutral score.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::FailureIndexError;
use crate::domain::models::{FailureContext, FailureIndexConfig, FailureRecord, Match, Resolution};
use crate::domain::ports::EmbeddingBackend;

/// Tokenizes on whitespace/punctuation, hashes each token into one of
/// `dim` buckets, accumulates counts, L2-normalizes. Used whenever no
/// `EmbeddingBackend` is supplied.
pub fn token_hash_embed(text: &str, dim: usize) -> Vec<f32> {
    let mut buckets = vec![0f32; dim];
    for token in tokenize(text) {
        let bucket = bucket_hash(&token) % dim as u64;
        buckets[bucket as usize] += 1.0;
    }
    l2_normalize(&mut buckets);
    buckets
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn bucket_hash(token: &str) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// One-sided 95% Wilson lower bound on the success proportion. Defaults to
/// 0.5 when there are no votes, matching a cold resolution's neutral score.
pub fn wilson_lower_bound(helpful: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.5;
    }
    const Z: f64 = 1.959_963_984_540_054; // 95% two-sided critical value
    let n = f64::from(total);
    let p_hat = f64::from(helpful) / n;
    let z2 = Z * Z;
    (p_hat + z2 / (2.0 * n) - Z * ((p_hat * (1.0 - p_hat) + z2 / (4.0 * n)) / n).sqrt()) / (1.0 + z2 / n)
}

#[derive(Debug, Clone, Default)]
pub struct FailureStats {
    pub total_records: usize,
    pub resolved_count: usize,
    pub success_rate: f64,
    pub search_count: u64,
}

pub struct FailureIndex {
    config: FailureIndexConfig,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    records: RwLock<Vec<FailureRecord>>,
    search_count: std::sync::atomic::AtomicU64,
}

impl FailureIndex {
    pub fn new(config: FailureIndexConfig, embedder: Option<Arc<dyn EmbeddingBackend>>) -> Self {
        Self { config, embedder, records: RwLock::new(Vec::new()), search_count: std::sync::atomic::AtomicU64::new(0) }
    }

    async fn embed(&self, context: &FailureContext) -> Result<Vec<f32>, FailureIndexError> {
        let text = format!("{} {}", context.error_type, context.message);
        match &self.embedder {
            Some(backend) => backend.embed(&text).await.map_err(|e| FailureIndexError::EmbeddingFailed(e.to_string())),
            None => Ok(token_hash_embed(&text, self.config.vector_dim)),
        }
    }

    /// Inserts a new record, evicting the oldest by timestamp if at capacity.
    pub async fn add(
        &self,
        context: FailureContext,
        id: Option<String>,
        resolution: Option<Resolution>,
        session_id: Option<String>,
        tags: Vec<String>,
    ) -> Result<FailureRecord, FailureIndexError> {
        let embedding = self.embed(&context).await?;
        let mut record = FailureRecord::new(id.unwrap_or_else(|| Uuid::new_v4().to_string()), context, embedding);
        record.session_id = session_id;
        record.tags = tags;
        if let Some(res) = resolution {
            record.add_resolution(res);
        }

        let mut records = self.records.write().await;
        if records.len() >= self.config.max_records {
            if let Some((oldest_idx, _)) = records.iter().enumerate().min_by_key(|(_, r)| r.timestamp) {
                records.remove(oldest_idx);
            }
        }
        records.push(record.clone());
        Ok(record)
    }

    pub async fn add_resolution(&self, record_id: &str, resolution: Resolution) -> bool {
        let mut records = self.records.write().await;
        records.iter_mut().find(|r| r.id == record_id).is_some_and(|r| r.add_resolution(resolution))
    }

    /// Matches against every record, filters by `similarityThreshold`,
    /// sorts descending by similarity.
    pub async fn search(&self, context: &FailureContext, top_k: Option<usize>) -> Result<Vec<(FailureRecord, f32)>, FailureIndexError> {
        self.search_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let query = self.embed(context).await?;
        let records = self.records.read().await;
        let mut scored: Vec<(FailureRecord, f32)> = records
            .iter()
            .map(|r| (r.clone(), cosine_similarity(&query, &r.embedding)))
            .filter(|(_, sim)| *sim >= self.config.similarity_threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(k) = top_k {
            scored.truncate(k);
        }
        Ok(scored)
    }

    pub async fn find_resolutions(&self, context: &FailureContext, only_successful: bool) -> Result<Vec<(FailureRecord, Resolution)>, FailureIndexError> {
        let hits = self.search(context, None).await?;
        Ok(hits
            .into_iter()
            .filter_map(|(r, _)| r.resolution.clone().map(|res| (r, res)))
            .filter(|(_, res)| !only_successful || res.successful)
            .collect())
    }

    pub async fn get_by_tag(&self, tag: &str) -> Vec<FailureRecord> {
        self.records.read().await.iter().filter(|r| r.tags.iter().any(|t| t == tag)).cloned().collect()
    }

    pub async fn get_by_type(&self, error_type: &str) -> Vec<FailureRecord> {
        self.records.read().await.iter().filter(|r| r.context.error_type == error_type).cloned().collect()
    }

    pub async fn get_recent(&self, n: usize) -> Vec<FailureRecord> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(n);
        records
    }

    pub async fn get_stats(&self) -> FailureStats {
        let records = self.records.read().await;
        let total_records = records.len();
        let resolved = records.iter().filter(|r| r.resolution.is_some()).count();
        let successful = records.iter().filter(|r| r.resolution.as_ref().is_some_and(|res| res.successful)).count();
        FailureStats {
            total_records,
            resolved_count: resolved,
            success_rate: if resolved == 0 { 0.0 } else { successful as f64 / resolved as f64 },
            search_count: self.search_count.load(std::sync::atomic::Ordering::Relaxed),
        }
    }

    /// Groups records by error type, keeping only types with at least `min_count` occurrences.
    pub async fn find_patterns(&self, min_count: usize) -> Vec<(String, usize)> {
        let records = self.records.read().await;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for r in records.iter() {
            *counts.entry(r.context.error_type.clone()).or_insert(0) += 1;
        }
        let mut patterns: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= min_count).collect();
        patterns.sort_by(|a, b| b.1.cmp(&a.1));
        patterns
    }

    pub async fn export(&self) -> Vec<FailureRecord> {
        self.records.read().await.clone()
    }

    pub async fn import(&self, records: Vec<FailureRecord>) -> Result<(), FailureIndexError> {
        if records.len() > self.config.max_records {
            return Err(FailureIndexError::SnapshotInvalid(format!(
                "{} records exceeds max_records {}",
                records.len(),
                self.config.max_records
            )));
        }
        *self.records.write().await = records;
        Ok(())
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

/// Weights for `Match::confidence = α·similarity + β·wilson + γ·recency`.
pub struct MatcherWeights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for MatcherWeights {
    fn default() -> Self {
        Self { alpha: 0.5, beta: 0.35, gamma: 0.15 }
    }
}

pub struct ResolutionMatcher {
    index: Arc<FailureIndex>,
    weights: MatcherWeights,
}

impl ResolutionMatcher {
    pub fn new(index: Arc<FailureIndex>) -> Self {
        Self { index, weights: MatcherWeights::default() }
    }

    pub async fn find_matches(&self, context: &FailureContext) -> Result<Vec<Match>, FailureIndexError> {
        let hits = self.index.search(context, None).await?;
        let now = Utc::now();
        let mut matches: Vec<Match> = hits
            .into_iter()
            .filter_map(|(record, similarity)| record.resolution.clone().map(|res| (record, similarity, res)))
            .filter(|(_, _, res)| res.successful)
            .map(|(record, similarity, resolution)| {
                let wilson = wilson_lower_bound(resolution.helpful_votes, resolution.total_votes);
                let age_days = (now - record.timestamp).num_days().max(0) as f64;
                let recency = 1.0 / (1.0 + age_days / 30.0);
                let confidence = self.weights.alpha * f64::from(similarity)
                    + self.weights.beta * wilson
                    + self.weights.gamma * recency;
                Match { record, resolution, similarity, confidence }
            })
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(matches)
    }

    pub async fn best_match(&self, context: &FailureContext) -> Result<Option<Match>, FailureIndexError> {
        Ok(self.find_matches(context).await?.into_iter().next())
    }

    pub async fn has_confident_match(&self, context: &FailureContext, threshold: f64) -> Result<bool, FailureIndexError> {
        Ok(self.best_match(context).await?.is_some_and(|m| m.confidence >= threshold))
    }

    pub async fn suggest_resolution(&self, context: &FailureContext) -> Result<Suggestion, FailureIndexError> {
        let matches = self.find_matches(context).await?;
        let Some(best) = matches.first() else {
            return Ok(Suggestion { suggestion: None, confidence: 0.0, explanation: "no prior resolution found".into(), alternatives: Vec::new() });
        };
        Ok(Suggestion {
            suggestion: Some(best.resolution.clone()),
            confidence: best.confidence,
            explanation: format!(
                "matched a prior {} failure with similarity {:.2}",
                best.record.context.error_type, best.similarity
            ),
            alternatives: matches.iter().skip(1).map(|m| m.resolution.clone()).collect(),
        })
    }

    pub async fn provide_feedback(&self, resolution_id: &str, helpful: bool) {
        let mut records = self.index.records.write().await;
        for record in records.iter_mut() {
            if let Some(res) = &mut record.resolution {
                if res.id == resolution_id {
                    res.record_vote(helpful);
                }
            }
        }
    }

    pub async fn resolution_quality(&self, resolution_id: &str) -> f64 {
        let records = self.index.records.read().await;
        records
            .iter()
            .filter_map(|r| r.resolution.as_ref())
            .find(|res| res.id == resolution_id)
            .map_or(0.5, |res| wilson_lower_bound(res.helpful_votes, res.total_votes))
    }

    pub async fn find_common_resolutions(&self, error_type: &str) -> Vec<Resolution> {
        let records = self.index.records.read().await;
        records
            .iter()
            .filter(|r| r.context.error_type == error_type)
            .filter_map(|r| r.resolution.clone())
            .filter(|res| res.successful)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub suggestion: Option<Resolution>,
    pub confidence: f64,
    pub explanation: String,
    pub alternatives: Vec<Resolution>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(message: &str, error_type: &str) -> FailureContext {
        FailureContext::new(message, error_type)
    }

    #[tokio::test]
    async fn capacity_evicts_the_oldest_record() {
        let config = FailureIndexConfig { max_records: 2, similarity_threshold: 0.0, vector_dim: 32 };
        let index = FailureIndex::new(config, None);
        index.add(ctx("a", "TypeError"), Some("r1".into()), None, None, vec![]).await.unwrap();
        index.add(ctx("b", "TypeError"), Some("r2".into()), None, None, vec![]).await.unwrap();
        index.add(ctx("c", "TypeError"), Some("r3".into()), None, None, vec![]).await.unwrap();
        let stats = index.get_stats().await;
        assert_eq!(stats.total_records, 2);
        assert!(index.get_recent(10).await.iter().all(|r| r.id != "r1"));
    }

    #[tokio::test]
    async fn search_filters_by_similarity_threshold() {
        let config = FailureIndexConfig { max_records: 10, similarity_threshold: 0.99, vector_dim: 32 };
        let index = FailureIndex::new(config, None);
        index.add(ctx("connection refused", "NetworkError"), None, None, None, vec![]).await.unwrap();
        let hits = index.search(&ctx("completely unrelated text", "TypeError"), None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn matching_requires_a_successful_resolution() {
        let config = FailureIndexConfig::default();
        let index = Arc::new(FailureIndex::new(config, None));
        index
            .add(
                ctx("timeout waiting for response", "TimeoutError"),
                Some("f1".into()),
                Some(Resolution::new("res1", "increase timeout", "bump timeout_ms", true)),
                None,
                vec![],
            )
            .await
            .unwrap();
        let matcher = ResolutionMatcher::new(index);
        let matches = matcher.find_matches(&ctx("timeout waiting for response", "TimeoutError")).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].resolution.id, "res1");
    }

    #[tokio::test]
    async fn cold_resolution_has_neutral_wilson_score() {
        assert!((wilson_lower_bound(0, 0) - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn many_helpful_votes_push_confidence_above_half() {
        let with_votes = wilson_lower_bound(90, 100);
        assert!(with_votes > 0.8);
    }

    #[tokio::test]
    async fn feedback_updates_resolution_quality() {
        let config = FailureIndexConfig::default();
        let index = Arc::new(FailureIndex::new(config, None));
        index
            .add(
                ctx("boom", "TypeError"),
                Some("f1".into()),
                Some(Resolution::new("res1", "retry", "retry", true)),
                None,
                vec![],
            )
            .await
            .unwrap();
        let matcher = ResolutionMatcher::new(index);
        for _ in 0..10 {
            matcher.provide_feedback("res1", true).await;
        }
        assert!(matcher.resolution_quality("res1").await > 0.6);
    }
}
