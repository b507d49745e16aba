//! 하이브리드 검색기 - 수집, 삭제, 질의 파이프라인
//!
//! 수집: 청킹 → 임베딩 → 검증 → 저장 → 인덱스 반영
//! 질의: 임베딩 → 벡터/BM25 검색 → RRF 통합 → 리랭크 → 근거 게이트 → 생성
//!
//! 인덱스는 `RwLock<Arc<SearchIndex>>` 스냅샷으로 공개됩니다. 질의는 시작 시
//! 스냅샷 하나를 잡고 끝까지 사용하므로 변경 중간 상태를 보지 않습니다.
//! 변경은 writer 뮤텍스로 직렬화되며, 스냅샷 복사본에 반영한 뒤 저장소와
//! 대조하고 교체합니다. 불일치가 발견되면 저장소에서 전체 재구축합니다.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{get_data_dir, RagConfig};
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::generation::{CompletionProvider, MistralChat};
use crate::query::{transform_query, Decision, QueryClassifier, RuleClassifier};

use super::chunker::{sentence_chunker, Chunker};
use super::fusion::RankFusion;
use super::gate::{EvidenceGate, GateDecision};
use super::index::{IndexStats, SearchIndex};
use super::rerank::Reranker;
use super::store::{ChunkStore, DocumentSummary, SqliteChunkStore, DB_FILE_NAME};
use super::types::{Chunk, ChunkKey, ContextPassage, PageText, RankedResult};

// ============================================================================
// Types
// ============================================================================

/// 문서 수집 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub source_file: String,
    pub chunk_count: usize,
    /// 기존 문서를 교체했는지 여부
    pub replaced: bool,
}

/// 검색 파이프라인 단계별 결과
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// 실제 검색에 사용된 질의 (확장 적용 후)
    pub query: String,
    /// RRF 후보 풀
    pub fused: Vec<RankedResult>,
    /// 리랭크 결과
    pub reranked: Vec<RankedResult>,
    /// 근거 게이트 판정
    pub decision: GateDecision,
}

/// 질문 응답 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AskOutcome {
    /// 근거 기반 답변
    Answered {
        answer: String,
        citations: Vec<ContextPassage>,
    },
    /// 근거 부족 (생성 미호출)
    InsufficientEvidence { top_score: Option<f32> },
    /// 거절 (PII, 법률/의료 자문)
    Refused { message: String },
    Greeting { message: String },
    Chat { message: String },
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// 하이브리드 검색기
///
/// 벡터 검색 + BM25 키워드 검색을 RRF로 통합하고,
/// 의미 유사도로 리랭크한 뒤 근거 게이트를 통과한 경우에만 답변을 생성합니다.
pub struct HybridRetriever {
    config: RagConfig,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    chunker: Box<dyn Chunker>,
    classifier: Box<dyn QueryClassifier>,
    fusion: RankFusion,
    reranker: Reranker,
    gate: EvidenceGate,
    index: RwLock<Arc<SearchIndex>>,
    writer: Mutex<()>,
}

impl HybridRetriever {
    /// 새 하이브리드 검색기 생성
    ///
    /// 저장소 내용으로 인덱스를 구축합니다.
    pub fn new(
        config: RagConfig,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> RagResult<Self> {
        let search = &config.search;
        let fusion = RankFusion::new(search.rrf_k, search.pool_size);
        let reranker = Reranker::new(search.final_size);
        let gate = EvidenceGate::new(search.threshold);

        let retriever = Self {
            chunker: sentence_chunker(config.chunking.clone()),
            classifier: Box::new(RuleClassifier),
            fusion,
            reranker,
            gate,
            index: RwLock::new(Arc::new(SearchIndex::new(search.bm25_k1, search.bm25_b))),
            writer: Mutex::new(()),
            config,
            store,
            embedder,
            completer,
        };

        let chunks = retriever.load_stored()?;
        let index = retriever.build_index(chunks)?;
        tracing::info!(
            "Hybrid retriever ready: {} chunks from {} documents ({} store, {} embedder)",
            index.len(),
            index.sources().len(),
            retriever.store.name(),
            retriever.embedder.name()
        );
        retriever.swap(index);

        Ok(retriever)
    }

    /// 기본 데이터 디렉토리로 생성 (SQLite + Mistral)
    pub fn open_default() -> anyhow::Result<Self> {
        Self::with_data_dir(&get_data_dir())
    }

    /// 지정된 데이터 디렉토리로 생성 (SQLite + Mistral)
    ///
    /// `MISTRAL_API_KEY`가 필요합니다.
    pub fn with_data_dir(data_dir: &Path) -> anyhow::Result<Self> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        }

        let config = RagConfig::load(data_dir)?;
        let store = SqliteChunkStore::open(&data_dir.join(DB_FILE_NAME))
            .context("Failed to open chunk store")?;
        let embedder = create_embedder(&config.providers).context("Failed to create embedder")?;
        let completer =
            MistralChat::from_env(&config.providers).context("Failed to create chat client")?;

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(embedder),
            Arc::new(completer),
        )?)
    }

    /// 청커 교체
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// 질의 분류기 교체
    pub fn with_classifier(mut self, classifier: Box<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// 문서 수집
    ///
    /// 같은 `source_file`이 이미 있으면 교체합니다. 임베딩 실패 시 아무것도
    /// 저장하지 않습니다. 청크가 없으면 변경 없이 0을 보고합니다.
    /// 이때 기존 문서는 그대로 검색되며 `replaced`는 false입니다. 문서를 비우려면
    /// [`Self::delete`]를 사용합니다.
    pub async fn ingest(&self, source_file: &str, pages: &[PageText]) -> RagResult<IngestReport> {
        if source_file.trim().is_empty() {
            return Err(RagError::Input("source_file is empty".to_string()));
        }

        let chunks = self.chunker.chunk(source_file, pages);
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for document: {}", source_file);
            return Ok(IngestReport {
                source_file: source_file.to_string(),
                chunk_count: 0,
                replaced: false,
            });
        }

        let chunks = self.embed_chunks(chunks).await?;

        let _guard = self.writer.lock().await;

        let mut next = SearchIndex::clone(&self.snapshot());
        next.remove(source_file);
        next.add(chunks.clone())?;

        let mut stored = self.load_stored()?;
        let replaced = stored.iter().any(|c| c.source_file == source_file);
        if replaced {
            stored.retain(|c| c.source_file != source_file);
            stored.extend(chunks.iter().cloned());
            self.store.replace(&stored).map_err(RagError::storage)?;
        } else {
            self.store.save(&chunks).map_err(RagError::storage)?;
        }

        self.verify_and_publish(next)?;

        tracing::info!(
            "Ingested {}: {} chunks{}",
            source_file,
            chunks.len(),
            if replaced { " (replaced)" } else { "" }
        );

        Ok(IngestReport {
            source_file: source_file.to_string(),
            chunk_count: chunks.len(),
            replaced,
        })
    }

    /// 문서 삭제 (청크가 없으면 0)
    pub async fn delete(&self, source_file: &str) -> RagResult<usize> {
        let _guard = self.writer.lock().await;

        let mut stored = self.load_stored()?;
        let before = stored.len();
        stored.retain(|c| c.source_file != source_file);
        let removed = before - stored.len();

        let snapshot = self.snapshot();
        if removed == 0 && !snapshot.contains_source(source_file) {
            tracing::debug!("Delete skipped, no chunks for {}", source_file);
            return Ok(0);
        }

        if removed > 0 {
            self.store.replace(&stored).map_err(RagError::storage)?;
        }

        let mut next = SearchIndex::clone(&snapshot);
        next.remove(source_file);
        self.verify_and_publish(next)?;

        tracing::info!("Deleted {}: {} chunks", source_file, removed);
        Ok(removed)
    }

    /// 저장소에서 전체 재구축
    pub async fn reload(&self) -> RagResult<IndexStats> {
        let _guard = self.writer.lock().await;

        let index = self.build_index(self.load_stored()?)?;
        let stats = index.stats();
        self.swap(index);

        tracing::info!(
            "Rebuilt index: {} chunks from {} documents",
            stats.chunk_count,
            stats.document_count
        );
        Ok(stats)
    }

    // ------------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------------

    /// 검색 파이프라인 (생성 없음)
    pub async fn retrieve(&self, question: &str) -> RagResult<Retrieval> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Input("question is empty".to_string()));
        }

        let query = if self.config.search.expand_queries {
            transform_query(question)
        } else {
            question.to_string()
        };

        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            tracing::debug!("Index is empty, skipping search");
            return Ok(Retrieval {
                query,
                fused: vec![],
                reranked: vec![],
                decision: self.gate.gate(vec![]),
            });
        }

        let query_embedding = self
            .embedder
            .embed(&query)
            .await
            .map_err(RagError::provider)?;

        let k = self.config.search.search_k;
        let semantic = snapshot.search_semantic(&query_embedding, k)?;
        let lexical = snapshot.search_lexical(&query, k);
        let fused = self.fusion.fuse(&semantic, &lexical);
        let reranked = self.reranker.rerank(&fused, &query_embedding)?;

        tracing::debug!(
            "Search '{}': semantic={}, lexical={}, fused={}, reranked={}",
            query,
            semantic.len(),
            lexical.len(),
            fused.len(),
            reranked.len()
        );

        let decision = self.gate.gate(reranked.clone());
        Ok(Retrieval {
            query,
            fused,
            reranked,
            decision,
        })
    }

    /// 질문 응답
    ///
    /// 인사, 잡담, 거절은 프로바이더를 호출하지 않습니다.
    /// 근거 게이트가 거부하면 생성 없이 `InsufficientEvidence`를 돌려줍니다.
    pub async fn ask(&self, question: &str) -> RagResult<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Input("question is empty".to_string()));
        }

        let decision = self.classifier.classify(question);
        if let Some(message) = decision.canned_reply() {
            tracing::debug!("Query answered without retrieval: {:?}", decision);
            return Ok(match decision {
                Decision::Greeting => AskOutcome::Greeting { message },
                Decision::Chat => AskOutcome::Chat { message },
                _ => AskOutcome::Refused { message },
            });
        }

        let retrieval = self.retrieve(question).await?;
        if let GateDecision::Reject { top_score } = retrieval.decision {
            return Ok(AskOutcome::InsufficientEvidence { top_score });
        }
        let passages = retrieval.decision.passages();

        let answer = self
            .completer
            .complete(&passages, question)
            .await
            .map_err(RagError::provider)?;

        Ok(AskOutcome::Answered {
            answer,
            citations: passages,
        })
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// 인덱스 통계
    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }

    /// 문서 목록
    pub fn documents(&self) -> RagResult<Vec<DocumentSummary>> {
        self.store.documents().map_err(RagError::storage)
    }

    /// 현재 설정
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// 현재 인덱스 스냅샷
    pub fn snapshot(&self) -> Arc<SearchIndex> {
        let guard = self.index.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> RagResult<Vec<Chunk>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(RagError::provider)?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::Provider(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk.with_embedding(embedding))
            .collect())
    }

    fn load_stored(&self) -> RagResult<Vec<Chunk>> {
        self.store.load().map_err(RagError::storage)
    }

    fn build_index(&self, chunks: Vec<Chunk>) -> RagResult<SearchIndex> {
        let mut index = SearchIndex::new(self.config.search.bm25_k1, self.config.search.bm25_b);
        index.rebuild(chunks)?;
        Ok(index)
    }

    /// 변경된 인덱스를 저장소와 대조한 뒤 교체
    ///
    /// 청크 키 집합이 다르면 저장소 기준으로 전체 재구축합니다.
    fn verify_and_publish(&self, next: SearchIndex) -> RagResult<()> {
        let stored = self.load_stored()?;
        let stored_keys: HashSet<ChunkKey> = stored.iter().map(Chunk::key).collect();

        let next = if stored_keys.len() == stored.len() && &stored_keys == next.keys() {
            next
        } else {
            let err = RagError::Consistency(format!(
                "index has {} chunks but storage has {}",
                next.len(),
                stored.len()
            ));
            tracing::warn!("{}; rebuilding from storage", err);
            self.build_index(stored)?
        };

        self.swap(next);
        Ok(())
    }

    fn swap(&self, next: SearchIndex) {
        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::knowledge::store::MemoryChunkStore;

    const DIM: usize = 1024;

    /// 해시 기반 bag-of-words 임베더 (결정적)
    #[derive(Default)]
    struct HashEmbedder {
        calls: AtomicUsize,
    }

    fn hash_embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIM];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            vector[(hasher.finish() as usize) % DIM] += 1.0;
        }
        vector
    }

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(hash_embed(text))
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn name(&self) -> &str {
            "hash"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("embedding service unavailable")
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// 첫 번째 근거 구절을 그대로 돌려주는 생성기
    #[derive(Default)]
    struct EchoCompleter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for EchoCompleter {
        async fn complete(&self, context: &[ContextPassage], _question: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = context.first().context("no context")?;
            Ok(format!("According to {}: {}", first.source_file, first.text))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct Fixture {
        store: Arc<MemoryChunkStore>,
        embedder: Arc<HashEmbedder>,
        completer: Arc<EchoCompleter>,
        retriever: HybridRetriever,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryChunkStore::new());
        let embedder = Arc::new(HashEmbedder::default());
        let completer = Arc::new(EchoCompleter::default());
        let retriever = HybridRetriever::new(
            RagConfig::default(),
            store.clone(),
            embedder.clone(),
            completer.clone(),
        )
        .unwrap();

        Fixture {
            store,
            embedder,
            completer,
            retriever,
        }
    }

    fn geography() -> Vec<PageText> {
        vec![
            PageText::new(1, "Paris is the capital of France."),
            PageText::new(2, "Berlin is the capital of Germany."),
        ]
    }

    fn fruit() -> Vec<PageText> {
        vec![PageText::new(1, "Bananas are rich in potassium. Apples grow on trees.")]
    }

    #[tokio::test]
    async fn test_end_to_end_answer_with_citation() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();
        f.retriever.ingest("fruit.pdf", &fruit()).await.unwrap();

        let retrieval = f.retriever.retrieve("What is the capital of France?").await.unwrap();
        match &retrieval.decision {
            GateDecision::Accept(results) => {
                assert!(results[0].score > 0.4);
                assert_eq!(results[0].chunk.source_file, "geo.pdf");
                assert_eq!(results[0].chunk.page, 1);
            }
            other => panic!("expected accept, got {:?}", other),
        }

        let outcome = f.retriever.ask("What is the capital of France?").await.unwrap();
        match outcome {
            AskOutcome::Answered { answer, citations } => {
                assert!(answer.contains("Paris"));
                assert_eq!(citations[0].source_file, "geo.pdf");
                assert_eq!(citations[0].page, 1);
            }
            other => panic!("expected answer, got {:?}", other),
        }
        assert_eq!(f.completer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_page_capital_of_france() {
        let f = fixture();
        let page = PageText::new(
            1,
            "The capital of France is Paris. Paris has a population of over 2 million.",
        );
        let report = f.retriever.ingest("france.pdf", &[page]).await.unwrap();
        assert_eq!(report.chunk_count, 1);

        let retrieval = f.retriever.retrieve("What is the capital of France?").await.unwrap();
        assert_eq!(retrieval.reranked.len(), 1);
        assert!(retrieval.reranked[0].score > 0.4, "score {}", retrieval.reranked[0].score);
        assert!(retrieval.decision.is_accept());

        match f.retriever.ask("What is the capital of France?").await.unwrap() {
            AskOutcome::Answered { citations, .. } => {
                assert_eq!(citations.len(), 1);
                assert_eq!(citations[0].source_file, "france.pdf");
                assert_eq!(citations[0].page, 1);
            }
            other => panic!("expected answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reingest_without_text_keeps_previous_chunks() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();

        let report = f
            .retriever
            .ingest("geo.pdf", &[PageText::new(1, "   ")])
            .await
            .unwrap();

        assert_eq!(report.chunk_count, 0);
        assert!(!report.replaced);
        assert_eq!(f.retriever.stats().chunk_count, 2);
        assert_eq!(f.store.load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unrelated_question_skips_generation() {
        let f = fixture();
        f.retriever.ingest("fruit.pdf", &fruit()).await.unwrap();

        let outcome = f
            .retriever
            .ask("Which composer wrote the Moonlight Sonata symphony?")
            .await
            .unwrap();

        assert!(matches!(outcome, AskOutcome::InsufficientEvidence { .. }));
        assert_eq!(f.completer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_canned_replies_skip_providers() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();
        let embed_calls = f.embedder.calls.load(Ordering::SeqCst);

        assert!(matches!(
            f.retriever.ask("hello").await.unwrap(),
            AskOutcome::Greeting { .. }
        ));
        assert!(matches!(
            f.retriever.ask("my email is someone@example.com").await.unwrap(),
            AskOutcome::Refused { .. }
        ));

        assert_eq!(f.embedder.calls.load(Ordering::SeqCst), embed_calls);
        assert_eq!(f.completer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_question_is_input_error() {
        let f = fixture();
        assert!(matches!(f.retriever.ask("   ").await, Err(RagError::Input(_))));
        assert!(matches!(f.retriever.retrieve("").await, Err(RagError::Input(_))));
    }

    #[tokio::test]
    async fn test_empty_index_rejects() {
        let f = fixture();
        let retrieval = f.retriever.retrieve("What is the capital of France?").await.unwrap();
        assert!(matches!(retrieval.decision, GateDecision::Reject { top_score: None }));
        assert_eq!(f.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_document_everywhere() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();
        f.retriever.ingest("fruit.pdf", &fruit()).await.unwrap();
        let before = f.retriever.stats();

        let removed = f.retriever.delete("geo.pdf").await.unwrap();
        assert_eq!(removed, 2);

        let after = f.retriever.stats();
        assert_eq!(after.chunk_count, before.chunk_count - 2);
        assert_eq!(after.document_count, 1);
        assert!(f.store.load().unwrap().iter().all(|c| c.source_file == "fruit.pdf"));

        let retrieval = f.retriever.retrieve("What is the capital of France?").await.unwrap();
        assert!(retrieval.fused.iter().all(|r| r.chunk.source_file != "geo.pdf"));

        assert_eq!(f.retriever.delete("geo.pdf").await.unwrap(), 0);
        assert_eq!(f.retriever.delete("missing.pdf").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reingest_replaces_document() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();

        let report = f
            .retriever
            .ingest("geo.pdf", &[PageText::new(1, "Rome is the capital of Italy.")])
            .await
            .unwrap();

        assert!(report.replaced);
        assert_eq!(report.chunk_count, 1);
        assert_eq!(f.store.load().unwrap().len(), 1);
        assert_eq!(f.retriever.stats().chunk_count, 1);
        assert_eq!(f.retriever.documents().unwrap()[0].page_count, 1);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_storage_untouched() {
        let store = Arc::new(MemoryChunkStore::new());
        let retriever = HybridRetriever::new(
            RagConfig::default(),
            store.clone(),
            Arc::new(FailingEmbedder),
            Arc::new(EchoCompleter::default()),
        )
        .unwrap();

        let err = retriever.ingest("geo.pdf", &geography()).await.unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
        assert!(store.load().unwrap().is_empty());
        assert!(retriever.stats().chunk_count == 0);
    }

    #[tokio::test]
    async fn test_empty_pages_are_noop() {
        let f = fixture();
        let report = f.retriever.ingest("blank.pdf", &[]).await.unwrap();
        assert_eq!(report.chunk_count, 0);
        assert!(f.store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_drift_triggers_rebuild() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();

        // 인덱스를 거치지 않고 저장소에 직접 기록
        let ghost = Chunk {
            text: "Madrid is the capital of Spain.".to_string(),
            source_file: "ghost.pdf".to_string(),
            page: 1,
            chunk_index: 0,
            embedding: Some(hash_embed("Madrid is the capital of Spain.")),
        };
        f.store.save(&[ghost]).unwrap();

        f.retriever.ingest("fruit.pdf", &fruit()).await.unwrap();

        let snapshot = f.retriever.snapshot();
        assert!(snapshot.contains_source("ghost.pdf"));
        assert_eq!(snapshot.len(), f.store.load().unwrap().len());
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_changes() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();

        f.store.replace(&[]).unwrap();
        let stats = f.retriever.reload().await.unwrap();

        assert_eq!(stats.chunk_count, 0);
        assert!(f.retriever.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected_before_storage() {
        struct ShortEmbedder;

        #[async_trait]
        impl EmbeddingProvider for ShortEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![1.0, 0.0])
            }
            fn dimension(&self) -> usize {
                2
            }
            fn name(&self) -> &str {
                "short"
            }
        }

        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();

        let other = HybridRetriever::new(
            RagConfig::default(),
            f.store.clone(),
            Arc::new(ShortEmbedder),
            Arc::new(EchoCompleter::default()),
        )
        .unwrap();

        let err = other.ingest("fruit.pdf", &fruit()).await.unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
        assert_eq!(f.store.load().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_during_ingest() {
        let f = fixture();
        f.retriever.ingest("geo.pdf", &geography()).await.unwrap();
        let retriever = Arc::new(f.retriever);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let retriever = Arc::clone(&retriever);
            handles.push(tokio::spawn(async move {
                retriever.retrieve("What is the capital of France?").await
            }));
        }
        retriever.ingest("fruit.pdf", &fruit()).await.unwrap();

        for handle in handles {
            let retrieval = handle.await.unwrap().unwrap();
            assert!(retrieval.decision.is_accept());
        }
        assert_eq!(retriever.stats().document_count, 2);
    }

    #[tokio::test]
    async fn test_query_expansion_is_opt_in() {
        let store = Arc::new(MemoryChunkStore::new());
        let mut config = RagConfig::default();
        config.search.expand_queries = true;
        let retriever = HybridRetriever::new(
            config,
            store,
            Arc::new(HashEmbedder::default()),
            Arc::new(EchoCompleter::default()),
        )
        .unwrap();
        retriever
            .ingest("ml.pdf", &[PageText::new(1, "Machine learning models learn from data.")])
            .await
            .unwrap();

        let retrieval = retriever.retrieve("what is ML").await.unwrap();
        assert_eq!(retrieval.query, "definition explanation of machine learning ML");
        assert_eq!(retrieval.reranked[0].chunk.source_file, "ml.pdf");
    }
}
