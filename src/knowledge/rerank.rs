//! Reranker - 의미 유사도 기반 재정렬
//!
//! RRF 후보 풀은 서로 비교할 수 없는 두 순위를 섞은 결과이므로,
//! 질의 임베딩과의 코사인 유사도 하나로 다시 정렬하여 최종 결과를 만듭니다.
//! 키워드로만 들어온 청크도 결국 의미로 평가됩니다.

use std::sync::Arc;

use crate::error::{RagError, RagResult};

use super::types::{assign_ranks, RankedResult};
use super::vector::cosine_similarity;

/// 기본 최종 결과 수
pub const DEFAULT_FINAL_SIZE: usize = 5;

/// 의미 유사도 리랭커
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reranker {
    /// 최종 결과 수
    pub final_size: usize,
}

impl Default for Reranker {
    fn default() -> Self {
        Self {
            final_size: DEFAULT_FINAL_SIZE,
        }
    }
}

impl Reranker {
    pub fn new(final_size: usize) -> Self {
        Self { final_size }
    }

    /// 후보를 질의 유사도 내림차순으로 재정렬
    ///
    /// 동점은 후보 풀 순서를 유지합니다. 임베딩이 없는 후보는 인덱스 불일치입니다.
    pub fn rerank(
        &self,
        candidates: &[RankedResult],
        query_embedding: &[f32],
    ) -> RagResult<Vec<RankedResult>> {
        let mut scored = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let embedding = candidate.chunk.embedding.as_deref().ok_or_else(|| {
                RagError::Consistency(format!(
                    "candidate {} reached reranking without an embedding",
                    candidate.key()
                ))
            })?;
            if embedding.len() != query_embedding.len() {
                return Err(RagError::Input(format!(
                    "query dimension {} does not match candidate dimension {}",
                    query_embedding.len(),
                    embedding.len()
                )));
            }

            scored.push((
                Arc::clone(&candidate.chunk),
                cosine_similarity(query_embedding, embedding),
            ));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.final_size);

        Ok(assign_ranks(scored))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::test_support::{chunk, ranked};
    use crate::knowledge::types::Chunk;

    fn arc(idx: u32, embedding: Vec<f32>) -> Arc<Chunk> {
        Arc::new(chunk("a.pdf", 1, idx, "text", embedding))
    }

    #[test]
    fn test_reorders_by_semantic_similarity() {
        // 후보 풀 순서: 0 (직교), 1 (유사), 2 (동일)
        let pool = ranked(&[
            arc(0, vec![0.0, 1.0]),
            arc(1, vec![0.7, 0.3]),
            arc(2, vec![1.0, 0.0]),
        ]);

        let reranked = Reranker::new(5).rerank(&pool, &[1.0, 0.0]).unwrap();
        let order: Vec<u32> = reranked.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert!((reranked[0].score - 1.0).abs() < 1e-6);
        assert_eq!(reranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_truncates_to_final_size() {
        let chunks: Vec<_> = (0..10).map(|i| arc(i, vec![1.0, i as f32])).collect();
        let reranked = Reranker::default().rerank(&ranked(&chunks), &[1.0, 0.0]).unwrap();
        assert_eq!(reranked.len(), 5);
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let pool = ranked(&[arc(3, vec![1.0, 0.0]), arc(1, vec![2.0, 0.0])]);
        let reranked = Reranker::default().rerank(&pool, &[1.0, 0.0]).unwrap();
        assert_eq!(reranked[0].chunk.chunk_index, 3);
        assert_eq!(reranked[1].chunk.chunk_index, 1);
    }

    #[test]
    fn test_missing_embedding_is_consistency_error() {
        let mut c = chunk("a.pdf", 1, 0, "text", vec![]);
        c.embedding = None;
        let pool = ranked(&[Arc::new(c)]);

        let err = Reranker::default().rerank(&pool, &[1.0]).unwrap_err();
        assert!(matches!(err, RagError::Consistency(_)));
    }

    #[test]
    fn test_empty_pool() {
        assert!(Reranker::default().rerank(&[], &[1.0]).unwrap().is_empty());
    }
}
