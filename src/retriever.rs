//! Query-time retrieval over the per-domain indexes.
//!
//! Each domain's index is opened once when the [`Retriever`] is built and
//! stays either loaded or unavailable for the retriever's lifetime. Every
//! operational failure on the query path degrades to the domain's fallback
//! passages; only an index/text-file desynchronization is reported as an
//! error, since returning the wrong line for a vector would hand bogus
//! grounding text to the caller.

use crate::database::QdrantIndex;
use crate::domain::Domain;
use crate::embeddings::{EmbedError, Embedder};
use crate::index::{FlatL2Index, VectorIndex};
use log::{debug, error, info, warn};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_TOP_K: usize = 5;

/// Why a retrieval could not be served from the index
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("{domain} index is unavailable: {reason}")]
    IndexUnavailable { domain: Domain, reason: String },

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("nearest-neighbor search failed: {0}")]
    Search(anyhow::Error),

    #[error("failed to read {}: {source}", .path.display())]
    TextFile { path: PathBuf, source: io::Error },

    #[error(
        "{domain} index returned position {position} but {} has only {lines} lines; \
         index and text file are out of sync",
        .path.display()
    )]
    Desync {
        domain: Domain,
        position: usize,
        lines: usize,
        path: PathBuf,
    },
}

impl RetrievalError {
    /// Whether the caller should see this error instead of fallback passages
    pub fn is_fatal(&self) -> bool {
        matches!(self, RetrievalError::Desync { .. })
    }
}

/// Load state of one domain, fixed at construction
pub enum DomainIndex<I> {
    Loaded { index: I, text_path: PathBuf },
    Unavailable { reason: String },
}

impl<I> DomainIndex<I> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, DomainIndex::Loaded { .. })
    }
}

/// Embeds queries and looks them up in the per-domain indexes
pub struct Retriever<E, I> {
    embedder: E,
    domains: HashMap<Domain, DomainIndex<I>>,
}

impl<E: Embedder> Retriever<E, FlatL2Index> {
    /// Open `<data_dir>/<domain>.index` for every domain.
    ///
    /// A missing or unreadable index marks that domain unavailable; this never fails.
    pub fn open_flat(embedder: E, data_dir: &Path) -> Self {
        let domains = Domain::ALL
            .into_iter()
            .map(|domain| {
                let index_path = domain.index_path(data_dir);
                let state = match FlatL2Index::read_from(&index_path) {
                    Ok(index) => {
                        info!(
                            "Loaded {} index: {} vectors from {}",
                            domain,
                            index.len(),
                            index_path.display()
                        );
                        DomainIndex::Loaded {
                            index,
                            text_path: domain.text_path(data_dir),
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} index unavailable ({}): {}; serving fallback passages",
                            domain,
                            index_path.display(),
                            e
                        );
                        DomainIndex::Unavailable {
                            reason: format!("{}: {}", index_path.display(), e),
                        }
                    }
                };
                (domain, state)
            })
            .collect();

        Retriever { embedder, domains }
    }
}

impl<E: Embedder> Retriever<E, QdrantIndex> {
    /// Open every domain's Qdrant collection; the text files still live in `data_dir`
    pub async fn open_qdrant(embedder: E, client: Arc<Qdrant>, data_dir: &Path) -> Self {
        let mut domains = HashMap::new();
        for domain in Domain::ALL {
            let state = match QdrantIndex::open(Arc::clone(&client), domain).await {
                Ok(index) => {
                    info!("Opened {} collection {}", domain, domain.collection_name());
                    DomainIndex::Loaded {
                        index,
                        text_path: domain.text_path(data_dir),
                    }
                }
                Err(e) => {
                    warn!(
                        "{} collection unavailable: {:#}; serving fallback passages",
                        domain, e
                    );
                    DomainIndex::Unavailable {
                        reason: format!("{:#}", e),
                    }
                }
            };
            domains.insert(domain, state);
        }

        Retriever { embedder, domains }
    }
}

impl<E: Embedder, I: VectorIndex> Retriever<E, I> {
    /// Build from already-resolved domain states. Domains left out are unavailable.
    pub fn from_parts(embedder: E, domains: HashMap<Domain, DomainIndex<I>>) -> Self {
        Retriever { embedder, domains }
    }

    pub fn is_available(&self, domain: Domain) -> bool {
        self.domains
            .get(&domain)
            .map(DomainIndex::is_loaded)
            .unwrap_or(false)
    }

    /// Up to `top_k` passages for `query`, nearest first.
    ///
    /// Falls back to the domain's fixed passages whenever the index, the
    /// embedding service, or the text file cannot serve the query. Returns an
    /// error only when the index and its text file disagree.
    pub async fn retrieve(
        &self,
        domain: Domain,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if query.trim().is_empty() {
            debug!("Blank {} query; serving fallback passages", domain);
            return Ok(domain.fallback_passages());
        }

        match self.lookup(domain, query, top_k).await {
            Ok(passages) => Ok(passages),
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                Err(e)
            }
            Err(RetrievalError::IndexUnavailable { .. }) => Ok(domain.fallback_passages()),
            Err(e) => {
                warn!("{} retrieval degraded to fallback: {}", domain, e);
                Ok(domain.fallback_passages())
            }
        }
    }

    /// Retrieval without fallback; every failure is returned
    pub async fn lookup(
        &self,
        domain: Domain,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let (index, text_path) = match self.domains.get(&domain) {
            Some(DomainIndex::Loaded { index, text_path }) => (index, text_path),
            Some(DomainIndex::Unavailable { reason }) => {
                return Err(RetrievalError::IndexUnavailable {
                    domain,
                    reason: reason.clone(),
                })
            }
            None => {
                return Err(RetrievalError::IndexUnavailable {
                    domain,
                    reason: "not configured".to_string(),
                })
            }
        };

        let query_embedding = self.embedder.embed(query).await?;
        let neighbors = index
            .search(&query_embedding, top_k)
            .await
            .map_err(RetrievalError::Search)?;

        let content = tokio::fs::read_to_string(text_path).await.map_err(|source| {
            RetrievalError::TextFile {
                path: text_path.clone(),
                source,
            }
        })?;
        let lines: Vec<&str> = content.lines().collect();

        neighbors
            .iter()
            .map(|neighbor| {
                lines
                    .get(neighbor.position)
                    .map(|line| line.trim().to_string())
                    .ok_or_else(|| RetrievalError::Desync {
                        domain,
                        position: neighbor.position,
                        lines: lines.len(),
                        path: text_path.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Embedding;
    use crate::indexer::tests::LetterEmbedder;
    use crate::indexer::Indexer;
    use std::fs;

    /// Embedder that always fails, as when the service is down
    struct DownEmbedder;

    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Embedding, EmbedError> {
            Err(EmbedError::Unavailable("connection refused".to_string()))
        }
    }

    /// Build both domains' flat indexes from small fixture corpora
    async fn build_fixture(data_dir: &Path) {
        let corpus = tempfile::tempdir().unwrap();
        let workouts = Domain::Workout.source_dir(corpus.path());
        let nutrition = Domain::Nutrition.source_dir(corpus.path());
        fs::create_dir_all(&workouts).unwrap();
        fs::create_dir_all(&nutrition).unwrap();

        fs::write(workouts.join("lifts.txt"), "aaaa aaaa bbbb bbbb").unwrap();
        fs::write(
            nutrition.join("protein.txt"),
            "aaa aaa bbb bbb ccc ccc ddd ddd abc abc",
        )
        .unwrap();

        let indexer = Indexer::new(LetterEmbedder::new())
            .with_dimension(4)
            .with_chunk_words(2);
        for domain in Domain::ALL {
            indexer
                .build_index(
                    &domain.source_dir(corpus.path()),
                    &domain.index_path(data_dir),
                    &domain.text_path(data_dir),
                )
                .await
                .unwrap();
        }
    }

    fn text_lines(data_dir: &Path, domain: Domain) -> Vec<String> {
        fs::read_to_string(domain.text_path(data_dir))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_retrieve_returns_verbatim_lines_nearest_first() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        let retriever = Retriever::open_flat(LetterEmbedder::new(), data.path());

        let passages = retriever
            .retrieve(Domain::Nutrition, "ccc cc", 3)
            .await
            .unwrap();

        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0], "ccc ccc");
        let lines = text_lines(data.path(), Domain::Nutrition);
        assert!(passages.iter().all(|p| lines.contains(p)));
    }

    #[tokio::test]
    async fn test_results_are_ordered_by_distance() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        let embedder = LetterEmbedder::new();
        let retriever = Retriever::open_flat(&embedder, data.path());

        let query = "ab d";
        let passages = retriever
            .retrieve(Domain::Nutrition, query, 5)
            .await
            .unwrap();
        assert_eq!(passages.len(), 5);

        let q = embedder.embed(query).await.unwrap();
        let mut last = f32::MIN;
        for passage in &passages {
            let v = embedder.embed(passage).await.unwrap();
            let d: f32 = v
                .values
                .iter()
                .zip(&q.values)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            assert!(d >= last);
            last = d;
        }
    }

    #[tokio::test]
    async fn test_top_k_larger_than_corpus_returns_everything() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        let retriever = Retriever::open_flat(LetterEmbedder::new(), data.path());

        let passages = retriever
            .retrieve(Domain::Workout, "aaaa", DEFAULT_TOP_K)
            .await
            .unwrap();

        assert_eq!(passages, vec!["aaaa aaaa", "bbbb bbbb"]);
    }

    #[tokio::test]
    async fn test_missing_index_serves_fallback_for_any_query() {
        let data = tempfile::tempdir().unwrap();
        let retriever = Retriever::open_flat(LetterEmbedder::new(), data.path());

        assert!(!retriever.is_available(Domain::Workout));
        for query in ["protein timing", "squat", "anything at all"] {
            let passages = retriever.retrieve(Domain::Workout, query, 2).await.unwrap();
            assert_eq!(passages, Domain::Workout.fallback_passages());
        }
    }

    #[tokio::test]
    async fn test_corrupt_index_marks_only_that_domain_unavailable() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        fs::write(Domain::Workout.index_path(data.path()), b"garbage").unwrap();

        let retriever = Retriever::open_flat(LetterEmbedder::new(), data.path());

        assert!(!retriever.is_available(Domain::Workout));
        assert!(retriever.is_available(Domain::Nutrition));
    }

    #[tokio::test]
    async fn test_embedding_failure_serves_same_fallback_as_missing_index() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        let retriever = Retriever::open_flat(DownEmbedder, data.path());
        assert!(retriever.is_available(Domain::Nutrition));

        let passages = retriever
            .retrieve(Domain::Nutrition, "protein timing", 3)
            .await
            .unwrap();
        assert_eq!(passages, Domain::Nutrition.fallback_passages());

        let err = retriever
            .lookup(Domain::Nutrition, "protein timing", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_missing_text_file_serves_fallback() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        fs::remove_file(Domain::Workout.text_path(data.path())).unwrap();
        let retriever = Retriever::open_flat(LetterEmbedder::new(), data.path());

        let passages = retriever.retrieve(Domain::Workout, "aaaa", 1).await.unwrap();

        assert_eq!(passages, Domain::Workout.fallback_passages());
    }

    #[tokio::test]
    async fn test_truncated_text_file_is_a_fatal_desync() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        // keep only the first line of a two-line file
        let first = text_lines(data.path(), Domain::Workout).remove(0);
        fs::write(Domain::Workout.text_path(data.path()), format!("{}\n", first)).unwrap();
        let retriever = Retriever::open_flat(LetterEmbedder::new(), data.path());

        let err = retriever
            .retrieve(Domain::Workout, "bbbb", 1)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(
            err,
            RetrievalError::Desync {
                position: 1,
                lines: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_blank_query_and_zero_k() {
        let data = tempfile::tempdir().unwrap();
        build_fixture(data.path()).await;
        let retriever = Retriever::open_flat(DownEmbedder, data.path());

        assert_eq!(
            retriever.retrieve(Domain::Workout, "   ", 3).await.unwrap(),
            Domain::Workout.fallback_passages()
        );
        assert!(retriever
            .retrieve(Domain::Workout, "squat", 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_domain_is_unavailable() {
        let retriever: Retriever<_, FlatL2Index> =
            Retriever::from_parts(LetterEmbedder::new(), HashMap::new());

        let passages = retriever.retrieve(Domain::Nutrition, "oats", 2).await.unwrap();

        assert_eq!(passages, Domain::Nutrition.fallback_passages());
    }
}
