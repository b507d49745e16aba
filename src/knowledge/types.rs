//! 공통 데이터 타입 - 청크, 랭킹 결과

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Chunk
// ============================================================================

/// 검색 가능한 최소 텍스트 단위
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 정규화된 청크 텍스트 (비어있지 않음)
    pub text: String,
    /// 원본 문서 식별자 (파일 이름)
    pub source_file: String,
    /// 페이지 번호 (1부터 시작)
    pub page: u32,
    /// 페이지 내 청크 순번 (0부터 시작)
    pub chunk_index: u32,
    /// 임베딩 벡터 (인덱싱 전 반드시 설정)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// 청크 식별 키
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            source_file: self.source_file.clone(),
            page: self.page,
            chunk_index: self.chunk_index,
        }
    }

    /// 임베딩 차원 (임베딩이 없으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.embedding.as_ref().map(Vec::len)
    }

    /// 임베딩 부착
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// 청크 식별 키: `(source_file, page, chunk_index)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub source_file: String,
    pub page: u32,
    pub chunk_index: u32,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#p{}.{}", self.source_file, self.page, self.chunk_index)
    }
}

/// 추출된 페이지 텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 페이지 번호 (1부터 시작)
    pub page: u32,
    /// 정규화된 텍스트
    pub text: String,
}

impl PageText {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

// ============================================================================
// RankedResult
// ============================================================================

/// 각 랭킹 단계가 만드는 결과
///
/// `score`의 의미는 단계마다 다릅니다 (코사인, BM25, RRF).
/// 단계 간 점수를 비교하면 안 됩니다.
#[derive(Debug, Clone)]
pub struct RankedResult {
    /// 청크 참조
    pub chunk: Arc<Chunk>,
    /// 단계별 점수
    pub score: f32,
    /// 해당 단계 내 0-based 순위
    pub rank: usize,
}

impl RankedResult {
    pub fn key(&self) -> ChunkKey {
        self.chunk.key()
    }
}

/// 점수 목록에 0..n 순위를 다시 매김
pub(crate) fn assign_ranks(scored: Vec<(Arc<Chunk>, f32)>) -> Vec<RankedResult> {
    scored
        .into_iter()
        .enumerate()
        .map(|(rank, (chunk, score))| RankedResult { chunk, score, rank })
        .collect()
}

/// 생성 단계에 넘기는 근거 구절 (인용 정보 포함)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextPassage {
    pub source_file: String,
    pub page: u32,
    pub text: String,
    /// 리랭크 점수 (코사인 유사도)
    pub score: f32,
}

impl From<&RankedResult> for ContextPassage {
    fn from(result: &RankedResult) -> Self {
        Self {
            source_file: result.chunk.source_file.clone(),
            page: result.chunk.page,
            text: result.chunk.text.clone(),
            score: result.score,
        }
    }
}
