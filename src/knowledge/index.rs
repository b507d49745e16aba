//! Search Index - 벡터 인덱스 + BM25 인덱스 묶음
//!
//! 두 인덱스는 항상 같은 청크 집합을 반영해야 하므로 하나의 소유 구조로 묶고,
//! 변경은 이 구조를 통해서만 수행합니다. 전체 청크 목록으로부터
//! [`SearchIndex::rebuild`]로 언제든 재구축할 수 있습니다.
//!
//! 검색기는 이 구조를 `Arc`로 감싼 불변 스냅샷으로 읽기 측에 공개합니다.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{RagError, RagResult};

use super::lexical::{LexicalIndex, DEFAULT_B, DEFAULT_K1};
use super::types::{Chunk, ChunkKey, RankedResult};
use super::vector::VectorIndex;

/// 인덱스 통계
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub document_count: usize,
    pub vocabulary_size: usize,
    pub average_length: f32,
    pub dimension: Option<usize>,
}

/// 벡터 + 키워드 인덱스
#[derive(Debug, Clone)]
pub struct SearchIndex {
    k1: f32,
    b: f32,
    vector: VectorIndex,
    lexical: LexicalIndex,
    keys: HashSet<ChunkKey>,
    /// source_file -> 청크 수
    sources: BTreeMap<String, usize>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new(DEFAULT_K1, DEFAULT_B)
    }
}

impl SearchIndex {
    /// BM25 파라미터를 지정하여 빈 인덱스 생성
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            vector: VectorIndex::new(),
            lexical: LexicalIndex::new(k1, b),
            keys: HashSet::new(),
            sources: BTreeMap::new(),
        }
    }

    /// 전체 청크 목록으로 재구축
    ///
    /// 저장소에서 읽은 데이터가 불변식을 어기면 `Consistency` 에러이며,
    /// 이 경우 인덱스는 변경되지 않습니다.
    pub fn rebuild(&mut self, chunks: Vec<Chunk>) -> RagResult<()> {
        let mut fresh = Self::new(self.k1, self.b);
        fresh
            .insert(chunks)
            .map_err(|e| RagError::Consistency(format!("rebuild rejected stored chunks: {}", e)))?;

        *self = fresh;
        tracing::debug!(
            "Rebuilt search index: {} chunks from {} documents",
            self.len(),
            self.sources.len()
        );
        Ok(())
    }

    /// 청크 추가 (두 인덱스 동시)
    ///
    /// 빈 텍스트, 임베딩 누락, 차원 불일치, 중복 키는 `Input` 에러이며
    /// 이 경우 어느 인덱스에도 추가되지 않습니다.
    pub fn add(&mut self, chunks: Vec<Chunk>) -> RagResult<usize> {
        self.insert(chunks).map_err(RagError::Input)
    }

    /// 특정 문서의 청크 모두 삭제 (없으면 0)
    pub fn remove(&mut self, source_file: &str) -> usize {
        let removed_vectors = self.vector.remove(source_file);
        let removed_terms = self.lexical.remove(source_file);
        debug_assert_eq!(removed_vectors, removed_terms);

        self.keys.retain(|k| k.source_file != source_file);
        self.sources.remove(source_file);
        removed_vectors
    }

    fn insert(&mut self, chunks: Vec<Chunk>) -> Result<usize, String> {
        self.validate(&chunks)?;

        let chunks: Vec<Arc<Chunk>> = chunks.into_iter().map(Arc::new).collect();
        self.vector.add(&chunks).map_err(|e| e.to_string())?;
        self.lexical.add(&chunks);

        for chunk in &chunks {
            self.keys.insert(chunk.key());
            *self.sources.entry(chunk.source_file.clone()).or_insert(0) += 1;
        }
        Ok(chunks.len())
    }

    /// 추가 전 불변식 검사 (부분 반영 방지)
    fn validate(&self, chunks: &[Chunk]) -> Result<(), String> {
        let mut dimension = self.vector.dimension();
        let mut batch_keys = HashSet::new();

        for chunk in chunks {
            let key = chunk.key();
            if chunk.text.trim().is_empty() {
                return Err(format!("chunk {} has empty text", key));
            }
            if chunk.page == 0 {
                return Err(format!("chunk {} has page 0", key));
            }
            let dim = chunk
                .dimension()
                .ok_or_else(|| format!("chunk {} has no embedding", key))?;
            if dim == 0 {
                return Err(format!("chunk {} has an empty embedding", key));
            }
            match dimension {
                Some(expected) if expected != dim => {
                    return Err(format!(
                        "chunk {} has dimension {}, corpus has {}",
                        key, dim, expected
                    ));
                }
                _ => dimension = Some(dim),
            }
            if self.keys.contains(&key) || !batch_keys.insert(key.clone()) {
                return Err(format!("duplicate chunk {}", key));
            }
        }
        Ok(())
    }

    /// 의미 검색 (리스트 A)
    pub fn search_semantic(&self, query_embedding: &[f32], k: usize) -> RagResult<Vec<RankedResult>> {
        self.vector.search(query_embedding, k)
    }

    /// 키워드 검색 (리스트 B)
    pub fn search_lexical(&self, query: &str, k: usize) -> Vec<RankedResult> {
        self.lexical.search(query, k)
    }

    /// 인덱스된 청크 키 집합
    pub fn keys(&self) -> &HashSet<ChunkKey> {
        &self.keys
    }

    /// 문서별 청크 수
    pub fn sources(&self) -> &BTreeMap<String, usize> {
        &self.sources
    }

    pub fn contains_source(&self, source_file: &str) -> bool {
        self.sources.contains_key(source_file)
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vector.dimension()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let lexical = self.lexical.stats();
        IndexStats {
            chunk_count: self.len(),
            document_count: self.sources.len(),
            vocabulary_size: lexical.vocabulary_size,
            average_length: lexical.average_length,
            dimension: self.dimension(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::test_support::chunk;

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("doc1.pdf", 1, 0, "solar panels convert sunlight", vec![1.0, 0.0]),
            chunk("doc1.pdf", 1, 1, "panels need cleaning", vec![0.8, 0.2]),
            chunk("doc2.pdf", 1, 0, "wind turbines spin", vec![0.0, 1.0]),
        ]
    }

    #[test]
    fn test_rebuild_populates_both_indexes() {
        let mut index = SearchIndex::default();
        index.rebuild(corpus()).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.sources().get("doc1.pdf"), Some(&2));
        assert_eq!(index.dimension(), Some(2));
        assert_eq!(index.search_semantic(&[1.0, 0.0], 10).unwrap().len(), 3);
        assert_eq!(index.search_lexical("panels", 10).len(), 2);
    }

    #[test]
    fn test_rebuild_rejects_bad_storage_and_keeps_state() {
        let mut index = SearchIndex::default();
        index.rebuild(corpus()).unwrap();

        let mut bad = corpus();
        bad.push(chunk("doc3.pdf", 1, 0, "mismatch", vec![1.0, 0.0, 0.0]));
        let err = index.rebuild(bad).unwrap_err();

        assert!(matches!(err, RagError::Consistency(_)));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_add_is_all_or_nothing() {
        let mut index = SearchIndex::default();
        index.rebuild(corpus()).unwrap();

        let batch = vec![
            chunk("doc3.pdf", 1, 0, "fine chunk", vec![0.5, 0.5]),
            chunk("doc3.pdf", 1, 1, "   ", vec![0.5, 0.5]),
        ];
        assert!(matches!(index.add(batch), Err(RagError::Input(_))));
        assert_eq!(index.len(), 3);
        assert!(index.search_lexical("fine", 10).is_empty());
    }

    #[test]
    fn test_add_rejects_duplicates_and_missing_embeddings() {
        let mut index = SearchIndex::default();
        index.rebuild(corpus()).unwrap();

        let dup = vec![chunk("doc1.pdf", 1, 0, "again", vec![1.0, 0.0])];
        assert!(matches!(index.add(dup), Err(RagError::Input(_))));

        let mut missing = chunk("doc4.pdf", 1, 0, "no vector", vec![]);
        missing.embedding = None;
        assert!(matches!(index.add(vec![missing]), Err(RagError::Input(_))));
    }

    #[test]
    fn test_remove_applies_to_both_indexes() {
        let mut index = SearchIndex::default();
        index.rebuild(corpus()).unwrap();

        assert_eq!(index.remove("doc1.pdf"), 2);
        assert_eq!(index.remove("doc1.pdf"), 0);

        assert!(!index.contains_source("doc1.pdf"));
        assert!(index.search_lexical("panels", 10).is_empty());
        assert!(index
            .search_semantic(&[1.0, 0.0], 10)
            .unwrap()
            .iter()
            .all(|r| r.chunk.source_file == "doc2.pdf"));

        let stats = index.stats();
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.average_length, 3.0);
    }

    #[test]
    fn test_incremental_matches_rebuild() {
        let mut incremental = SearchIndex::default();
        incremental.rebuild(corpus()).unwrap();
        incremental.remove("doc2.pdf");
        incremental
            .add(vec![chunk("doc5.pdf", 2, 0, "tidal energy", vec![0.3, 0.7])])
            .unwrap();

        let mut expected: Vec<Chunk> = corpus().into_iter().filter(|c| c.source_file != "doc2.pdf").collect();
        expected.push(chunk("doc5.pdf", 2, 0, "tidal energy", vec![0.3, 0.7]));
        let mut rebuilt = SearchIndex::default();
        rebuilt.rebuild(expected).unwrap();

        assert_eq!(incremental.keys(), rebuilt.keys());
        assert_eq!(incremental.stats(), rebuilt.stats());
    }
}
