//! Lexical Index - 인메모리 BM25 역색인
//!
//! 용어 빈도, 문서 길이, 용어별 문서 빈도를 `add`/`remove` 시점에
//! 증분 갱신하므로 검색 시 전체 코퍼스를 다시 훑지 않습니다.
//!
//! ref: https://en.wikipedia.org/wiki/Okapi_BM25
//!
//! ```text
//! idf(t)   = ln((N - df + 0.5) / (df + 0.5) + 1)
//! score(d) = Σ idf(t) * f(t,d) * (k1 + 1) / (f(t,d) + k1 * (1 - b + b * |d| / avgdl))
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::types::{assign_ranks, Chunk, RankedResult};

/// BM25 기본 포화 파라미터
pub const DEFAULT_K1: f32 = 1.5;
/// BM25 기본 길이 정규화 파라미터
pub const DEFAULT_B: f32 = 0.75;

// ============================================================================
// Types
// ============================================================================

/// 색인된 문서
#[derive(Debug, Clone)]
struct LexicalDoc {
    chunk: Arc<Chunk>,
    /// 토큰 수
    length: usize,
    /// 포함된 고유 용어 (삭제 시 postings 정리용)
    terms: Vec<String>,
}

/// 인덱스 통계
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalStats {
    pub document_count: usize,
    pub vocabulary_size: usize,
    pub total_length: usize,
    pub average_length: f32,
}

// ============================================================================
// LexicalIndex
// ============================================================================

/// BM25 역색인
///
/// 문서는 삽입 순번(seq)으로 식별되며, 동점은 삽입 순서로 정렬됩니다.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    k1: f32,
    b: f32,
    /// seq -> 문서
    docs: BTreeMap<u64, LexicalDoc>,
    /// term -> (seq -> term frequency)
    postings: HashMap<String, BTreeMap<u64, u32>>,
    total_length: usize,
    next_seq: u64,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new(DEFAULT_K1, DEFAULT_B)
    }
}

impl LexicalIndex {
    /// 파라미터 지정 생성
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            docs: BTreeMap::new(),
            postings: HashMap::new(),
            total_length: 0,
            next_seq: 0,
        }
    }

    /// 청크 추가
    pub fn add(&mut self, chunks: &[Arc<Chunk>]) -> usize {
        for chunk in chunks {
            let tokens = tokenize(&chunk.text);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }

            let seq = self.next_seq;
            self.next_seq += 1;

            let mut terms = Vec::with_capacity(tf.len());
            for (term, freq) in tf {
                self.postings.entry(term.clone()).or_default().insert(seq, freq);
                terms.push(term);
            }

            self.total_length += tokens.len();
            self.docs.insert(
                seq,
                LexicalDoc {
                    chunk: Arc::clone(chunk),
                    length: tokens.len(),
                    terms,
                },
            );
        }

        chunks.len()
    }

    /// 특정 문서의 청크 모두 삭제
    ///
    /// 문서 빈도와 평균 길이는 남은 청크만 반영하도록 갱신됩니다.
    pub fn remove(&mut self, source_file: &str) -> usize {
        let doomed: Vec<u64> = self
            .docs
            .iter()
            .filter(|(_, d)| d.chunk.source_file == source_file)
            .map(|(seq, _)| *seq)
            .collect();

        for seq in &doomed {
            let Some(doc) = self.docs.remove(seq) else {
                continue;
            };
            self.total_length -= doc.length;

            for term in &doc.terms {
                if let Some(list) = self.postings.get_mut(term) {
                    list.remove(seq);
                    if list.is_empty() {
                        self.postings.remove(term);
                    }
                }
            }
        }

        doomed.len()
    }

    /// BM25 검색
    ///
    /// 점수가 0인 문서는 결과에서 제외됩니다. 어휘와 겹치는 용어가 없으면 빈 결과.
    pub fn search(&self, query: &str, k: usize) -> Vec<RankedResult> {
        if self.docs.is_empty() || k == 0 {
            return vec![];
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        let n = self.docs.len() as f32;
        let avgdl = self.average_length();
        let mut scores: HashMap<u64, f32> = HashMap::new();

        for term in &terms {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let idf = idf(n, list.len() as f32);

            for (seq, &freq) in list {
                let Some(doc) = self.docs.get(seq) else {
                    continue;
                };
                let f = freq as f32;
                let norm = 1.0 - self.b + self.b * doc.length as f32 / avgdl.max(f32::EPSILON);
                *scores.entry(*seq).or_insert(0.0) += idf * f * (self.k1 + 1.0) / (f + self.k1 * norm);
            }
        }

        let mut ranked: Vec<(u64, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);

        tracing::trace!("BM25 query {:?}: {} hits", query, ranked.len());

        assign_ranks(
            ranked
                .into_iter()
                .filter_map(|(seq, score)| self.docs.get(&seq).map(|d| (Arc::clone(&d.chunk), score)))
                .collect(),
        )
    }

    /// 평균 문서 길이 (토큰 수)
    pub fn average_length(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.docs.len() as f32
        }
    }

    /// 용어의 문서 빈도
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map(BTreeMap::len).unwrap_or(0)
    }

    /// 인덱스 통계
    pub fn stats(&self) -> LexicalStats {
        LexicalStats {
            document_count: self.docs.len(),
            vocabulary_size: self.postings.len(),
            total_length: self.total_length,
            average_length: self.average_length(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 소문자 변환 후 영숫자 연속 구간으로 토큰화
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// 항상 양수인 BM25 IDF
#[inline]
fn idf(n: f32, df: f32) -> f32 {
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

// ============================================================================
// Tests
// ============================================================================
