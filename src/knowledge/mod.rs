//! Knowledge 모듈 - 하이브리드 검색 코어
//!
//! - Chunker: 문장 인식 텍스트 분할 (오버랩)
//! - Vector: 코사인 유사도 검색
//! - Lexical: BM25 키워드 검색 (인메모리 역색인)
//! - Fusion: RRF 알고리즘으로 두 검색 결과 통합
//! - Rerank / Gate: 의미 유사도 재정렬, 근거 충분성 판단
//! - Store: SQLite 청크 저장소
//! - Hybrid: 전체 파이프라인

mod chunker;
mod fusion;
mod gate;
mod hybrid;
mod index;
mod lexical;
mod rerank;
mod store;
mod types;
mod vector;

// Re-exports
pub use chunker::{default_chunker, sentence_chunker, ChunkConfig, Chunker, SentenceChunker};
pub use fusion::{RankFusion, DEFAULT_POOL_SIZE, DEFAULT_RRF_K};
pub use gate::{EvidenceGate, GateDecision, DEFAULT_THRESHOLD};
pub use hybrid::{AskOutcome, HybridRetriever, IngestReport, Retrieval};
pub use index::{IndexStats, SearchIndex};
pub use lexical::{tokenize, LexicalIndex, LexicalStats, DEFAULT_B, DEFAULT_K1};
pub use rerank::{Reranker, DEFAULT_FINAL_SIZE};
pub use store::{ChunkStore, DocumentSummary, MemoryChunkStore, SqliteChunkStore, DB_FILE_NAME};
pub use types::{Chunk, ChunkKey, ContextPassage, PageText, RankedResult};
pub use vector::{cosine_similarity, normalize, VectorIndex};
