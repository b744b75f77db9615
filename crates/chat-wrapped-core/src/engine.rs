//! The retrieval engine: one corpus, every search strategy.
//!
//! [`RetrievalEngine`] owns the corpus, builds the lexical index eagerly and
//! the semantic index lazily. The semantic index is built at most once per
//! engine: concurrent first callers wait on the same build, and a failed
//! build leaves nothing behind so the next semantic call retries.
//!
//! Hybrid searches never fail because of the embedding provider; they come
//! back as [`HybridResults`] with [`SemanticStatus::Degraded`] instead.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::engagement::{rank_threads, score_segment, ScoringOptions};
use crate::error::ProviderError;
use crate::fusion::{fuse, FusionWeights, HybridResults, SemanticStatus};
use crate::keyword::KeywordMatcher;
use crate::lexical::{Bm25Index, Bm25Params};
use crate::models::{ConversationThread, Corpus, MessageId, SearchMethod, SearchResult};
use crate::segment::{segment, SegmentOptions};
use crate::semantic::{embed_one, EmbedOptions, EmbeddingProvider, SemanticIndex};

/// Engine-wide retrieval settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub weights: FusionWeights,
    pub case_insensitive: bool,
    pub bm25: Bm25Params,
    pub embed: EmbedOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            case_insensitive: true,
            bm25: Bm25Params::default(),
            embed: EmbedOptions::default(),
        }
    }
}

/// Thread extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ThreadOptions {
    #[serde(default = "default_max_gap_minutes")]
    pub max_gap_minutes: u32,
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,
    /// Threads kept by [`RetrievalEngine::top_threads`].
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_sample_chars")]
    pub sample_chars: usize,
}

fn default_max_gap_minutes() -> u32 {
    SegmentOptions::default().max_gap_minutes
}
fn default_min_messages() -> usize {
    SegmentOptions::default().min_messages
}
fn default_top_n() -> usize {
    5
}
fn default_sample_chars() -> usize {
    ScoringOptions::default().sample_chars
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            max_gap_minutes: default_max_gap_minutes(),
            min_messages: default_min_messages(),
            top_n: default_top_n(),
            sample_chars: default_sample_chars(),
        }
    }
}

impl ThreadOptions {
    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions {
            max_gap_minutes: self.max_gap_minutes,
            min_messages: self.min_messages,
        }
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            sample_chars: self.sample_chars,
        }
    }
}

pub struct RetrievalEngine {
    corpus: Corpus,
    lexical: Bm25Index,
    provider: Arc<dyn EmbeddingProvider>,
    semantic: OnceCell<SemanticIndex>,
    config: EngineConfig,
}

impl RetrievalEngine {
    /// Build an engine over `corpus`. Only the lexical index is built here.
    ///
    /// # Panics
    ///
    /// Panics if the fusion weights or embedding options are invalid.
    pub fn new(corpus: Corpus, provider: Arc<dyn EmbeddingProvider>, config: EngineConfig) -> Self {
        config.weights.validate();
        config.embed.validate();
        let lexical = Bm25Index::build(&corpus, config.bm25);
        tracing::debug!(
            messages = corpus.len(),
            model = provider.model_name(),
            "retrieval engine ready"
        );
        Self {
            corpus,
            lexical,
            provider,
            semantic: OnceCell::new(),
            config,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True once the semantic index has been built successfully.
    pub fn is_semantic_ready(&self) -> bool {
        self.semantic.initialized()
    }

    pub fn search_lexical(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        self.lexical.search(query, top_k)
    }

    pub fn search_keyword(
        &self,
        pattern: &str,
        case_insensitive: bool,
        top_k: usize,
    ) -> Vec<SearchResult> {
        KeywordMatcher::new(&self.corpus).search(pattern, case_insensitive, top_k)
    }

    /// The semantic index, built on first use.
    pub async fn semantic_index(&self) -> Result<&SemanticIndex, ProviderError> {
        self.semantic
            .get_or_try_init(|| {
                SemanticIndex::build(&self.corpus, self.provider.as_ref(), &self.config.embed)
            })
            .await
    }

    pub async fn search_semantic(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let index = self.semantic_index().await?;
        index
            .search(self.provider.as_ref(), query, top_k, self.config.embed.timeout)
            .await
    }

    /// Hybrid search with the engine's configured weights.
    pub async fn search_hybrid(&self, query: &str, top_k: usize) -> HybridResults {
        self.search_hybrid_weighted(query, top_k, &self.config.weights)
            .await
    }

    /// Fuse lexical, semantic and keyword candidates (`2 × top_k` each).
    /// `top_k == 0` returns nothing without touching the provider.
    ///
    /// # Panics
    ///
    /// Panics if `weights` is invalid.
    pub async fn search_hybrid_weighted(
        &self,
        query: &str,
        top_k: usize,
        weights: &FusionWeights,
    ) -> HybridResults {
        weights.validate();
        if top_k == 0 {
            return HybridResults::empty();
        }
        let candidates = top_k.saturating_mul(2);
        let lexical = self.search_lexical(query, candidates);
        let keyword = self.search_keyword(query, self.config.case_insensitive, candidates);
        let semantic = self.search_semantic(query, candidates).await;
        self.finish_hybrid(&lexical, semantic, &keyword, weights, top_k)
    }

    /// Semantic neighbours of a message already in the corpus, itself
    /// excluded.
    pub async fn find_similar(
        &self,
        id: MessageId,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let index = self.semantic_index().await?;
        let Some(reference) = index.vector(id) else {
            return Ok(Vec::new());
        };
        let others: Vec<MessageId> = self.corpus.ids().into_iter().filter(|o| *o != id).collect();
        Ok(index.rank(reference, &others, top_k))
    }

    /// Hybrid search over one sender's messages.
    ///
    /// Lexical statistics are computed over that sender's messages alone.
    /// Message embeddings come from the shared index; only the query is
    /// embedded.
    pub async fn search_by_sender(&self, sender: &str, query: &str, top_k: usize) -> HybridResults {
        let ids = self.corpus.by_sender(sender);
        if ids.is_empty() || top_k == 0 {
            return HybridResults::empty();
        }
        let candidates = top_k.saturating_mul(2);
        let lexical = Bm25Index::build_for(&self.corpus, &ids, self.config.bm25).search(query, candidates);
        let keyword = KeywordMatcher::new(&self.corpus).search_within(
            &ids,
            query,
            self.config.case_insensitive,
            candidates,
        );
        let semantic = self.rank_semantic_within(query, &ids, candidates).await;
        self.finish_hybrid(&lexical, semantic, &keyword, &self.config.weights, top_k)
    }

    /// The last `n` messages of `sender`, in corpus order.
    ///
    /// Not a ranking: every result is tagged [`SearchMethod::Filtered`]
    /// with score 1.0.
    pub fn recent_by_sender(&self, sender: &str, n: usize) -> Vec<SearchResult> {
        let ids = self.corpus.by_sender(sender);
        let start = ids.len().saturating_sub(n);
        ids[start..]
            .iter()
            .map(|&id| SearchResult::new(id, 1.0, SearchMethod::Filtered))
            .collect()
    }

    /// Every conversation thread, scored, in chronological order.
    pub fn threads(&self, opts: &ThreadOptions) -> Vec<ConversationThread> {
        let total_participants = self.corpus.participants().len();
        let scoring = opts.scoring_options();
        segment(&self.corpus, &opts.segment_options())
            .iter()
            .map(|s| score_segment(&self.corpus, s, total_participants, &scoring))
            .collect()
    }

    /// The `opts.top_n` most engaging threads, best first.
    pub fn top_threads(&self, opts: &ThreadOptions) -> Vec<ConversationThread> {
        rank_threads(self.threads(opts), opts.top_n)
    }

    async fn rank_semantic_within(
        &self,
        query: &str,
        ids: &[MessageId],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let index = self.semantic_index().await?;
        if index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.provider.as_ref(), query, self.config.embed.timeout).await?;
        Ok(index.rank(&query_vec, ids, top_k))
    }

    fn finish_hybrid(
        &self,
        lexical: &[SearchResult],
        semantic: Result<Vec<SearchResult>, ProviderError>,
        keyword: &[SearchResult],
        weights: &FusionWeights,
        top_k: usize,
    ) -> HybridResults {
        let (semantic_results, status) = match semantic {
            Ok(results) => (results, SemanticStatus::Included),
            Err(err) => {
                tracing::warn!(error = %err, "semantic search unavailable, fusing lexical and keyword only");
                (Vec::new(), SemanticStatus::Degraded(err))
            }
        };
        HybridResults {
            results: fuse(lexical, &semantic_results, keyword, weights, top_k),
            semantic: status,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::test_utils::{corpus_at, corpus_of, BagOfWordsProvider, FailingProvider, SlowProvider};

    fn engine_with(corpus: Corpus, provider: Arc<dyn EmbeddingProvider>) -> RetrievalEngine {
        RetrievalEngine::new(corpus, provider, EngineConfig::default())
    }

    fn sample_corpus() -> Corpus {
        corpus_at(&[
            (0, "Ann", "who wants pizza tonight"),
            (1, "Bob", "pizza again? sure"),
            (2, "Ann", "my cat knocked over the plant"),
            (3, "Cy", "the weather is awful today"),
            (4, "Bob", "cat pictures please"),
            (5, "Ann", "ordering pizza now"),
        ])
    }

    /// Fails the first call, then behaves like a bag-of-words provider.
    struct FlakyProvider {
        inner: BagOfWordsProvider,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ProviderError::Unavailable("warming up".to_string()));
            }
            self.inner.embed(texts).await
        }
    }

    #[tokio::test]
    async fn test_semantic_index_is_lazy_and_built_once() {
        let provider = Arc::new(BagOfWordsProvider::new());
        let engine = engine_with(sample_corpus(), provider.clone());
        assert!(!engine.is_semantic_ready());
        assert_eq!(provider.calls(), 0);

        engine.search_semantic("pizza", 3).await.unwrap();
        engine.search_semantic("cat", 3).await.unwrap();
        assert!(engine.is_semantic_ready());
        // One build batch plus one call per query.
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_build() {
        let provider = Arc::new(BagOfWordsProvider::new());
        let engine = engine_with(sample_corpus(), provider.clone());
        let (a, b) = tokio::join!(engine.search_semantic("pizza", 3), engine.search_semantic("cat", 3));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let provider = Arc::new(FlakyProvider {
            inner: BagOfWordsProvider::new(),
            attempts: AtomicUsize::new(0),
        });
        let engine = engine_with(sample_corpus(), provider);
        assert!(engine.search_semantic("pizza", 3).await.is_err());
        assert!(!engine.is_semantic_ready());
        let results = engine.search_semantic("pizza", 3).await.unwrap();
        assert!(!results.is_empty());
        assert!(engine.is_semantic_ready());
    }

    #[tokio::test]
    async fn test_hybrid_included() {
        let engine = engine_with(sample_corpus(), Arc::new(BagOfWordsProvider::new()));
        let hybrid = engine.search_hybrid("pizza", 3).await;
        assert!(!hybrid.is_degraded());
        assert_eq!(hybrid.results.len(), 3);
        assert!(hybrid.results.iter().all(|r| r.method == SearchMethod::Fused));
        let mut ids: Vec<_> = hybrid.results.iter().map(|r| r.id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 5]);
    }

    #[tokio::test]
    async fn test_hybrid_degrades_when_provider_fails() {
        let engine = engine_with(sample_corpus(), Arc::new(FailingProvider));
        let hybrid = engine.search_hybrid("pizza", 5).await;
        assert!(hybrid.is_degraded());
        assert!(matches!(
            hybrid.degradation(),
            Some(ProviderError::Unavailable(_))
        ));
        assert!(!hybrid.results.is_empty());
        for r in &hybrid.results {
            assert_eq!(r.breakdown.unwrap().semantic, 0.0);
        }
    }

    #[tokio::test]
    async fn test_hybrid_degrades_when_provider_times_out() {
        let config = EngineConfig {
            embed: EmbedOptions {
                timeout: Duration::from_millis(20),
                ..EmbedOptions::default()
            },
            ..EngineConfig::default()
        };
        let engine = RetrievalEngine::new(
            sample_corpus(),
            Arc::new(SlowProvider::new(Duration::from_secs(5))),
            config,
        );
        let hybrid = engine.search_hybrid("pizza", 5).await;
        assert!(matches!(hybrid.degradation(), Some(ProviderError::Timeout(_))));
        let mut ids: Vec<_> = hybrid.results.iter().map(|r| r.id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 5]);
        assert!(!engine.is_semantic_ready());
    }

    #[tokio::test]
    async fn test_zero_top_k_never_calls_provider() {
        let provider = Arc::new(BagOfWordsProvider::new());
        let engine = engine_with(sample_corpus(), provider.clone());
        let hybrid = engine.search_hybrid("pizza", 0).await;
        assert!(hybrid.results.is_empty());
        assert!(!hybrid.is_degraded());
        assert!(engine.search_by_sender("Ann", "pizza", 0).await.results.is_empty());
        assert_eq!(provider.calls(), 0);
        assert!(!engine.is_semantic_ready());
    }

    #[tokio::test]
    async fn test_hybrid_lexical_only_weights_match_lexical() {
        let engine = engine_with(sample_corpus(), Arc::new(BagOfWordsProvider::new()));
        let lexical: Vec<_> = engine.search_lexical("pizza cat", 4).iter().map(|r| r.id).collect();
        let hybrid = engine
            .search_hybrid_weighted("pizza cat", 4, &FusionWeights::new(1.0, 0.0, 0.0))
            .await;
        let fused: Vec<_> = hybrid.results.iter().map(|r| r.id).collect();
        assert_eq!(fused, lexical);
    }

    #[tokio::test]
    async fn test_find_similar_excludes_self() {
        let corpus = corpus_of(&["pizza tonight", "pizza tonight", "cat", "pizza"]);
        let engine = engine_with(corpus, Arc::new(BagOfWordsProvider::new()));
        let results = engine.find_similar(MessageId(0), 5).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_find_similar_unknown_id() {
        let engine = engine_with(corpus_of(&["a"]), Arc::new(BagOfWordsProvider::new()));
        assert!(engine.find_similar(MessageId(9), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_by_sender_restricts_and_reuses_embeddings() {
        let provider = Arc::new(BagOfWordsProvider::new());
        let engine = engine_with(sample_corpus(), provider.clone());
        engine.semantic_index().await.unwrap();
        let before = provider.calls();

        let hybrid = engine.search_by_sender("Ann", "pizza", 5).await;
        assert!(!hybrid.is_degraded());
        assert!(!hybrid.results.is_empty());
        for r in &hybrid.results {
            assert_eq!(engine.corpus().get(r.id).sender, "Ann");
        }
        // Only the query was embedded.
        assert_eq!(provider.calls(), before + 1);
    }

    #[tokio::test]
    async fn test_search_by_unknown_sender() {
        let engine = engine_with(sample_corpus(), Arc::new(FailingProvider));
        let hybrid = engine.search_by_sender("Nobody", "pizza", 5).await;
        assert!(hybrid.results.is_empty());
        assert!(!hybrid.is_degraded());
    }

    #[test]
    fn test_recent_by_sender() {
        let engine = engine_with(sample_corpus(), Arc::new(FailingProvider));
        let recent = engine.recent_by_sender("Ann", 2);
        let ids: Vec<_> = recent.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 5]);
        assert!(recent
            .iter()
            .all(|r| r.method == SearchMethod::Filtered && r.score == 1.0));
        assert_eq!(engine.recent_by_sender("Ann", 50).len(), 3);
        assert!(engine.recent_by_sender("Nobody", 3).is_empty());
    }

    #[tokio::test]
    async fn test_empty_corpus_everything_empty() {
        let engine = engine_with(Corpus::default(), Arc::new(FailingProvider));
        assert!(engine.search_lexical("x", 5).is_empty());
        assert!(engine.search_keyword("x", true, 5).is_empty());
        assert!(engine.search_semantic("x", 5).await.unwrap().is_empty());
        let hybrid = engine.search_hybrid("x", 5).await;
        assert!(hybrid.results.is_empty());
        assert!(!hybrid.is_degraded());
        assert!(engine.threads(&ThreadOptions::default()).is_empty());
    }

    #[test]
    fn test_top_threads() {
        let mut rows = Vec::new();
        // A lively A/B exchange, a quiet gap, then a monologue.
        for i in 0..6 {
            rows.push((i, if i % 2 == 0 { "A" } else { "B" }, "let's talk about the trip"));
        }
        for i in 0..6 {
            rows.push((60 + i, "A", "ok"));
        }
        let engine = engine_with(corpus_at(&rows), Arc::new(FailingProvider));
        let opts = ThreadOptions {
            min_messages: 3,
            top_n: 1,
            ..ThreadOptions::default()
        };
        let all = engine.threads(&opts);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message_ids[0], MessageId(0));

        let top = engine.top_threads(&opts);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].message_ids[0], MessageId(0));
        assert_eq!(top[0].message_count, 6);
    }
}
