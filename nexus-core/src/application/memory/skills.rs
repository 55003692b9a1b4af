use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::error::MemoryError;
use crate::domain::{SkillEntry, SkillVector};
use crate::infrastructure::model::EmbeddingGateway;
use crate::infrastructure::store::JsonFile;

#[derive(Debug, Clone, PartialEq)]
pub struct SkillMatch {
    pub name: String,
    pub path: String,
    pub description: String,
    pub score: f32,
}

/// Semantic index over the skill catalog, cached in `skill_vectors.json`
/// and rebuilt only when the catalog checksum changes.
pub struct SkillIndex {
    catalog: Vec<SkillEntry>,
    cache: JsonFile,
    threshold: f32,
    embedder: Option<Arc<dyn EmbeddingGateway>>,
    vectors: RwLock<Vec<SkillVector>>,
}

impl SkillIndex {
    pub fn new(catalog: Vec<SkillEntry>, cache_path: impl Into<PathBuf>, threshold: f32) -> Self {
        Self {
            catalog,
            cache: JsonFile::new(cache_path),
            threshold,
            embedder: None,
            vectors: RwLock::new(Vec::new()),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingGateway>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn checksum(&self) -> String {
        catalog_checksum(&self.catalog)
    }

    /// Loads cached vectors when their checksum matches the catalog, otherwise
    /// re-embeds. Without an embedder the index stays keyword-only.
    pub async fn refresh(&self) -> Result<usize, MemoryError> {
        let checksum = self.checksum();
        let cached: Vec<SkillVector> = self.cache.load()?.unwrap_or_default();
        if !cached.is_empty()
            && cached.len() == self.catalog.len()
            && cached.iter().all(|vector| vector.checksum == checksum)
        {
            debug!(skills = cached.len(), "Skill vectors up to date");
            let count = cached.len();
            self.replace(cached);
            return Ok(count);
        }

        let Some(embedder) = self.embedder.as_ref() else {
            self.replace(Vec::new());
            return Ok(0);
        };
        if self.catalog.is_empty() {
            self.replace(Vec::new());
            return Ok(0);
        }

        let inputs: Vec<String> = self.catalog.iter().map(SkillEntry::embedding_text).collect();
        let embeddings = embedder.embed(&inputs).await?;
        let vectors: Vec<SkillVector> = self
            .catalog
            .iter()
            .zip(embeddings)
            .map(|(entry, embedding)| SkillVector {
                name: entry.name.clone(),
                path: entry.path.clone(),
                description: entry.description.clone(),
                keywords: entry.keywords.clone(),
                embedding,
                checksum: checksum.clone(),
            })
            .collect();
        info!(skills = vectors.len(), "Skill vectors rebuilt");
        if let Err(err) = self.cache.save(&vectors) {
            warn!(error = %err, "Failed to cache skill vectors");
        }
        let count = vectors.len();
        self.replace(vectors);
        Ok(count)
    }

    /// Best skills for `query`. Uses cosine similarity when vectors and an
    /// embedder are available, falling back to keyword matching.
    pub async fn lookup(&self, query: &str, limit: usize) -> Vec<SkillMatch> {
        if let Some(matches) = self.semantic_lookup(query, limit).await
            && !matches.is_empty()
        {
            return matches;
        }
        self.keyword_lookup(query, limit)
    }

    async fn semantic_lookup(&self, query: &str, limit: usize) -> Option<Vec<SkillMatch>> {
        let embedder = self.embedder.as_ref()?;
        let vectors = self.snapshot();
        if vectors.is_empty() {
            return None;
        }
        let query_vector = match embedder.embed(&[query.to_string()]).await {
            Ok(mut embedded) if !embedded.is_empty() => embedded.swap_remove(0),
            Ok(_) => return None,
            Err(err) => {
                warn!(error = %err, "Query embedding failed, using keyword match");
                return None;
            }
        };
        let mut matches: Vec<SkillMatch> = vectors
            .iter()
            .map(|vector| SkillMatch {
                name: vector.name.clone(),
                path: vector.path.clone(),
                description: vector.description.clone(),
                score: cosine(&query_vector, &vector.embedding),
            })
            .filter(|candidate| candidate.score >= self.threshold)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        Some(matches)
    }

    fn keyword_lookup(&self, query: &str, limit: usize) -> Vec<SkillMatch> {
        let query = query.to_lowercase();
        let mut matches: Vec<SkillMatch> = self
            .catalog
            .iter()
            .filter_map(|entry| {
                let hits = entry
                    .keywords
                    .iter()
                    .chain(std::iter::once(&entry.name))
                    .filter(|keyword| !keyword.is_empty() && query.contains(&keyword.to_lowercase()))
                    .count();
                (hits > 0).then(|| SkillMatch {
                    name: entry.name.clone(),
                    path: entry.path.clone(),
                    description: entry.description.clone(),
                    score: hits as f32,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        matches
    }

    fn snapshot(&self) -> Vec<SkillVector> {
        self.vectors
            .read()
            .map(|vectors| vectors.clone())
            .unwrap_or_default()
    }

    fn replace(&self, vectors: Vec<SkillVector>) {
        if let Ok(mut guard) = self.vectors.write() {
            *guard = vectors;
        }
    }
}

pub fn catalog_checksum(catalog: &[SkillEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in catalog {
        hasher.update(entry.name.as_bytes());
        hasher.update(b"|");
        hasher.update(entry.path.as_bytes());
        hasher.update(b"|");
        hasher.update(entry.embedding_text().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::model::ModelError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Embeds by keyword presence over a fixed vocabulary.
    struct VocabEmbedder {
        calls: AtomicUsize,
    }

    const VOCAB: [&str; 3] = ["pdf", "image", "email"];

    #[async_trait]
    impl EmbeddingGateway for VocabEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs
                .iter()
                .map(|input| {
                    let lower = input.to_lowercase();
                    VOCAB
                        .iter()
                        .map(|word| if lower.contains(word) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
    }

    fn catalog() -> Vec<SkillEntry> {
        vec![
            SkillEntry {
                name: "pdf-tools".into(),
                path: "skills/pdf".into(),
                description: "Merge and split PDF files".into(),
                keywords: vec!["pdf".into()],
            },
            SkillEntry {
                name: "mailer".into(),
                path: "skills/mail".into(),
                description: "Send email reports".into(),
                keywords: vec!["email".into(), "smtp".into()],
            },
        ]
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn vectors_are_reused_while_checksum_matches() {
        let dir = TempDir::new().expect("tempdir");
        let embedder = Arc::new(VocabEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cache_path = dir.path().join("skill_vectors.json");

        let index = SkillIndex::new(catalog(), &cache_path, 0.3).with_embedder(embedder.clone());
        assert_eq!(index.refresh().await.expect("refresh"), 2);

        let again = SkillIndex::new(catalog(), &cache_path, 0.3).with_embedder(embedder.clone());
        again.refresh().await.expect("refresh");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let hits = again.lookup("please merge this pdf", 3).await;
        assert_eq!(hits[0].name, "pdf-tools");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn keyword_fallback_without_embedder() {
        let dir = TempDir::new().expect("tempdir");
        let index = SkillIndex::new(catalog(), dir.path().join("v.json"), 0.3);
        assert_eq!(index.refresh().await.expect("refresh"), 0);

        let hits = index.lookup("send the weekly email via smtp", 3).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "mailer");
        assert_eq!(hits[0].score, 2.0);
    }

    #[test]
    fn checksum_changes_with_catalog() {
        let mut changed = catalog();
        changed[0].keywords.push("merge".into());
        assert_ne!(catalog_checksum(&catalog()), catalog_checksum(&changed));
    }
}
