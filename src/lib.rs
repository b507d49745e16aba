//! docqa-rag - PDF 문서 질의응답 RAG 시스템
//!
//! 벡터 검색 + BM25 키워드 검색을 RRF로 결합하고,
//! 의미 유사도 리랭크와 근거 게이트를 거쳐 답변을 생성합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;
pub mod mistral;
pub mod query;

// Re-exports
pub use collector::{CollectedFile, CollectorConfig, PdfCollector};
pub use config::{get_data_dir, ProviderConfig, RagConfig, SearchConfig};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, MistralEmbedding};
pub use error::{RagError, RagResult};
pub use extractor::{extract_document, extract_pages, ExtractError, ExtractedDocument};
pub use generation::{CompletionProvider, MistralChat};
pub use knowledge::{
    AskOutcome, Chunk, ChunkConfig, ChunkKey, ChunkStore, Chunker, ContextPassage, EvidenceGate,
    GateDecision, HybridRetriever, IndexStats, IngestReport, PageText, RankFusion, RankedResult,
    Reranker, Retrieval, SearchIndex, SqliteChunkStore,
};
pub use query::{Decision, QueryClassifier, RuleClassifier};
