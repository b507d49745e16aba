//! Reciprocal Rank Fusion
//!
//! 의미 검색(코사인)과 키워드 검색(BM25)의 점수 스케일은 서로 비교할 수 없으므로
//! 순위만 사용하여 통합합니다.
//!
//! ref: https://www.elastic.co/blog/hybrid-search-rrf
//!
//! ```text
//! RRF(d) = Σ 1 / (k + rank + 1)     (d가 등장한 리스트에 대해서만 합산)
//! ```
//!
//! 리스트에 없는 청크는 그 리스트에서 0을 받을 뿐 감점되지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{Chunk, ChunkKey, RankedResult};

/// 기본 RRF 상수
pub const DEFAULT_RRF_K: f32 = 60.0;
/// 기본 후보 풀 크기
pub const DEFAULT_POOL_SIZE: usize = 20;

/// 통합 중인 후보
struct Candidate {
    chunk: Arc<Chunk>,
    score: f32,
    /// 등장한 리스트들에서의 순위 합
    rank_sum: usize,
    /// 최초 등장 순서 (리스트 A 먼저)
    first_seen: usize,
}

/// RRF 통합기
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankFusion {
    /// RRF 상수 k
    pub k_const: f32,
    /// 결과 풀 크기
    pub pool_size: usize,
}

impl Default for RankFusion {
    fn default() -> Self {
        Self {
            k_const: DEFAULT_RRF_K,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RankFusion {
    pub fn new(k_const: f32, pool_size: usize) -> Self {
        Self { k_const, pool_size }
    }

    /// 두 랭킹 리스트 통합
    pub fn fuse(&self, list_a: &[RankedResult], list_b: &[RankedResult]) -> Vec<RankedResult> {
        self.fuse_all(&[list_a, list_b])
    }

    /// 여러 랭킹 리스트 통합
    ///
    /// 동점은 순위 합이 작은 쪽, 그다음 먼저 등장한 쪽이 앞섭니다.
    pub fn fuse_all(&self, lists: &[&[RankedResult]]) -> Vec<RankedResult> {
        let mut candidates: HashMap<ChunkKey, Candidate> = HashMap::new();
        let mut seen = 0;

        for list in lists {
            for result in list.iter() {
                let contribution = 1.0 / (self.k_const + result.rank as f32 + 1.0);
                let entry = candidates.entry(result.key()).or_insert_with(|| {
                    seen += 1;
                    Candidate {
                        chunk: Arc::clone(&result.chunk),
                        score: 0.0,
                        rank_sum: 0,
                        first_seen: seen,
                    }
                });
                entry.score += contribution;
                entry.rank_sum += result.rank;
            }
        }

        let mut fused: Vec<Candidate> = candidates.into_values().collect();
        fused.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.rank_sum.cmp(&b.rank_sum))
                .then(a.first_seen.cmp(&b.first_seen))
        });
        fused.truncate(self.pool_size);

        fused
            .into_iter()
            .enumerate()
            .map(|(rank, c)| RankedResult {
                chunk: c.chunk,
                score: c.score,
                rank,
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::test_support::{chunk, ranked};

    fn chunks(n: u32) -> Vec<Arc<Chunk>> {
        (0..n)
            .map(|i| Arc::new(chunk("a.pdf", 1, i, &format!("chunk {}", i), vec![1.0])))
            .collect()
    }

    #[test]
    fn test_rrf_score_calculation() {
        // 1위: 1 / (60 + 0 + 1) = 1/61 ≈ 0.0164
        let c = chunks(1);
        let fused = RankFusion::default().fuse(&ranked(&c), &[]);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-6);
        assert!((fused[0].score - 0.0164).abs() < 0.001);
    }

    #[test]
    fn test_top_in_both_beats_top_in_one() {
        let c = chunks(2);
        let a = Arc::clone(&c[0]);
        let b = Arc::clone(&c[1]);

        // A: 두 리스트 모두 0위 → 2/61, B: 별도 리스트에서만 0위 → 1/61
        let list_a = ranked(&[Arc::clone(&a)]);
        let list_b = ranked(&[Arc::clone(&a)]);
        let list_c = ranked(&[Arc::clone(&b)]);

        let fusion = RankFusion::default();
        let fused = fusion.fuse_all(&[&list_a, &list_b, &list_c]);

        assert_eq!(fused[0].key(), a.key());
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-6);
        assert!((fused[0].score - 0.0328).abs() < 0.001);
        assert_eq!(fused[1].key(), b.key());
        assert!((fused[1].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank0_in_both_lists_vs_one_list() {
        let c = chunks(2);
        let list_a = ranked(&[Arc::clone(&c[0]), Arc::clone(&c[1])]);
        let list_b = ranked(&[Arc::clone(&c[0])]);

        let fused = RankFusion::default().fuse(&list_a, &list_b);
        assert_eq!(fused[0].key(), c[0].key());
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-6);
        assert!((fused[1].score - 1.0 / 62.0).abs() < 1e-6);
    }

    #[test]
    fn test_absence_contributes_zero() {
        let c = chunks(3);
        let list_a = ranked(&[Arc::clone(&c[0]), Arc::clone(&c[1])]);
        let list_b = ranked(&[Arc::clone(&c[2])]);

        let fused = RankFusion::default().fuse(&list_a, &list_b);
        let score = |idx: u32| fused.iter().find(|r| r.chunk.chunk_index == idx).unwrap().score;

        assert!((score(0) - 1.0 / 61.0).abs() < 1e-6);
        assert!((score(1) - 1.0 / 62.0).abs() < 1e-6);
        assert!((score(2) - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_are_deterministic() {
        let c = chunks(2);
        // 둘 다 한 리스트에서만 0위 → 점수/순위합 동일 → 리스트 A 쪽이 먼저
        let list_a = ranked(&[Arc::clone(&c[1])]);
        let list_b = ranked(&[Arc::clone(&c[0])]);

        for _ in 0..10 {
            let fused = RankFusion::default().fuse(&list_a, &list_b);
            assert_eq!(fused[0].chunk.chunk_index, 1);
            assert_eq!(fused[1].chunk.chunk_index, 0);
        }
    }

    #[test]
    fn test_equal_score_prefers_smaller_rank_sum() {
        // k=0: Y, Z는 각각 0위 한 번 (1/1), X는 1위 두 번 (1/2 + 1/2) → 모두 1.0
        let fusion = RankFusion::new(0.0, 10);
        let c = chunks(3);
        let (x, y, z) = (&c[0], &c[1], &c[2]);
        let list_a = ranked(&[Arc::clone(y), Arc::clone(x)]);
        let list_b = ranked(&[Arc::clone(z), Arc::clone(x)]);

        let fused = fusion.fuse(&list_a, &list_b);
        assert_eq!(fused.len(), 3);
        assert!(fused.iter().all(|r| (r.score - 1.0).abs() < 1e-6));

        // 순위합 0인 Y, Z가 먼저 (등장 순서대로), 순위합 2인 X가 마지막
        let order: Vec<u32> = fused.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_truncates_to_pool_size_and_reassigns_ranks() {
        let c = chunks(30);
        let list_a = ranked(&c);
        let fused = RankFusion::new(60.0, 20).fuse(&list_a, &[]);

        assert_eq!(fused.len(), 20);
        assert!(fused.iter().enumerate().all(|(i, r)| r.rank == i));
        assert!(fused.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(RankFusion::default().fuse(&[], &[]).is_empty());
    }
}
