//! Vector Index - 인메모리 코사인 유사도 검색
//!
//! 삽입 시점에 벡터를 한 번 정규화하여 검색을 내적 연산으로 만듭니다.
//! 전수 탐색(exact search)이며 ANN은 사용하지 않습니다.

use std::sync::Arc;

use crate::error::{RagError, RagResult};

use super::types::{assign_ranks, Chunk, RankedResult};

// ============================================================================
// Types
// ============================================================================

/// 인덱스 엔트리
#[derive(Debug, Clone)]
struct VectorEntry {
    chunk: Arc<Chunk>,
    /// 단위 벡터 (크기 0 벡터는 그대로 0)
    unit: Vec<f32>,
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 벡터 인덱스
///
/// 엔트리는 삽입 순서대로 유지되며, 동점은 삽입 순서로 정렬됩니다.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<VectorEntry>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 임베딩이 있는 청크 추가
    ///
    /// 임베딩이 없거나 차원이 다르면 아무것도 추가하지 않고 `Input` 에러를 반환합니다.
    pub fn add(&mut self, chunks: &[Arc<Chunk>]) -> RagResult<usize> {
        let mut dimension = self.dimension;

        for chunk in chunks {
            let embedding = chunk.embedding.as_ref().ok_or_else(|| {
                RagError::Input(format!("chunk {} has no embedding", chunk.key()))
            })?;
            match dimension {
                Some(dim) if dim != embedding.len() => {
                    return Err(RagError::Input(format!(
                        "embedding dimension mismatch for {}: expected {}, got {}",
                        chunk.key(),
                        dim,
                        embedding.len()
                    )));
                }
                _ => dimension = Some(embedding.len()),
            }
        }

        // 검증 통과 후 일괄 삽입
        for chunk in chunks {
            let unit = chunk.embedding.as_deref().map(normalize).unwrap_or_default();
            self.entries.push(VectorEntry {
                chunk: Arc::clone(chunk),
                unit,
            });
        }
        self.dimension = dimension;

        Ok(chunks.len())
    }

    /// 특정 문서의 벡터 모두 삭제
    pub fn remove(&mut self, source_file: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.chunk.source_file != source_file);
        let removed = before - self.entries.len();

        if self.entries.is_empty() {
            self.dimension = None;
        }
        removed
    }

    /// 코사인 유사도 검색
    ///
    /// 빈 인덱스는 빈 결과를 반환합니다. 쿼리 차원이 다르면 `Input` 에러입니다.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> RagResult<Vec<RankedResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        if let Some(dim) = self.dimension {
            if dim != query_embedding.len() {
                return Err(RagError::Input(format!(
                    "query dimension mismatch: index has {}, query has {}",
                    dim,
                    query_embedding.len()
                )));
            }
        }

        let query = normalize(query_embedding);

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, dot(&query, &entry.unit)))
            .collect();

        // 안정 정렬: 동점은 삽입 순서 유지
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(assign_ranks(
            scored
                .into_iter()
                .map(|(pos, score)| (Arc::clone(&self.entries[pos].chunk), score))
                .collect(),
        ))
    }

    /// 인덱스된 벡터 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 인덱스 차원 (비어있으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 크기 0 벡터면 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product = dot(a, b);
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 단위 벡터로 정규화 (크기 0이면 0 벡터)
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = magnitude(v);
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

// ============================================================================
// Tests
// ============================================================================
