//! Text Chunking Module
//!
//! 페이지 텍스트를 문장 경계를 존중하는 겹침(overlap) 청크로 분할합니다.
//!
//! - 문장 분리: `.`, `!`, `?` 뒤 공백, 그리고 줄바꿈
//! - 목표 길이를 넘기 직전까지 문장을 탐욕적으로 누적
//! - 목표 길이를 넘는 단일 문장은 단어 경계에서 강제 분할
//! - 청크가 닫히면 끝 문장들(오버랩 길이 이내)로 다음 청크를 시작

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{Chunk, PageText};

/// 문장 경계: 종결 부호 + 공백, 또는 줄바꿈
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+|\n+").expect("Invalid regex"));

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// 목표 청크 길이 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 길이 (문자 수)
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 문서의 페이지들을 청크로 분할 (임베딩 미설정)
    fn chunk(&self, source_file: &str, pages: &[PageText]) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문장 인식 청커
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 텍스트를 문장 단위로 분리
    ///
    /// 목표 길이를 넘는 문장은 [`Self::hard_split`]으로 잘게 나눕니다.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut last = 0;

        for m in SENTENCE_BOUNDARY.find_iter(text) {
            // 종결 부호는 문장에 포함, 뒤따르는 공백은 제외
            let end = m.start() + m.as_str().trim_end().len();
            self.push_segment(&text[last..end], &mut sentences);
            last = m.end();
        }
        self.push_segment(&text[last..], &mut sentences);

        sentences
    }

    fn push_segment(&self, segment: &str, out: &mut Vec<String>) {
        let segment = segment.trim();
        if segment.is_empty() {
            return;
        }

        if char_len(segment) <= self.config.chunk_size {
            out.push(segment.to_string());
        } else {
            out.extend(self.hard_split(segment));
        }
    }

    /// 긴 문장을 단어 경계에서 분할 (최후 수단)
    ///
    /// 목표 길이보다 긴 단어 하나는 문자 경계에서 자릅니다.
    fn hard_split(&self, sentence: &str) -> Vec<String> {
        let size = self.config.chunk_size.max(1);
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for word in sentence.split_whitespace() {
            let word_len = char_len(word);

            if word_len > size {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                parts.extend(chars.chunks(size).map(|piece| piece.iter().collect::<String>()));
                continue;
            }

            if !current.is_empty() && current_len + 1 + word_len > size {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }

        if !current.is_empty() {
            parts.push(current);
        }

        parts
    }

    /// 한 페이지를 청크로 분할
    fn chunk_page(&self, source_file: &str, page: &PageText) -> Vec<Chunk> {
        if page.text.trim().is_empty() {
            return vec![];
        }

        let sentences = self.split_sentences(&page.text);
        let mut chunks = Vec::new();

        // current[..carried]는 이전 청크에서 넘어온 오버랩 문장
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;
        let mut carried = 0;

        for sentence in &sentences {
            let sentence_len = char_len(sentence) + 1;

            if current.len() > carried && current_len + sentence_len > self.config.chunk_size {
                chunks.push(self.make_chunk(source_file, page.page, chunks.len(), &current));

                let mut seed = self.overlap_seed(&current[carried..]);
                current_len = seed.iter().map(|s| char_len(s) + 1).sum();

                // 시드와 다음 문장이 목표 길이를 넘으면 앞쪽 시드 문장부터 버림
                while !seed.is_empty() && current_len + sentence_len > self.config.chunk_size {
                    current_len -= char_len(seed[0]) + 1;
                    seed.remove(0);
                }

                carried = seed.len();
                current = seed;
            }

            current.push(sentence);
            current_len += sentence_len;
        }

        // 오버랩 문장만 남았다면 이미 이전 청크에 포함됨
        if current.len() > carried {
            chunks.push(self.make_chunk(source_file, page.page, chunks.len(), &current));
        }

        chunks
    }

    /// 닫힌 청크의 끝 문장들 중 오버랩 길이 이내인 것
    ///
    /// 새로 추가된 문장만 대상으로 하므로, 한 문장은 인접한 두 청크에만 나타납니다.
    fn overlap_seed<'a>(&self, fresh: &[&'a str]) -> Vec<&'a str> {
        let mut seed = Vec::new();
        let mut seed_len = 0;

        for sentence in fresh.iter().rev() {
            let len = char_len(sentence) + 1;
            if seed_len + len > self.config.overlap {
                break;
            }
            seed.push(*sentence);
            seed_len += len;
        }

        seed.reverse();
        seed
    }

    fn make_chunk(&self, source_file: &str, page: u32, index: usize, sentences: &[&str]) -> Chunk {
        Chunk {
            text: sentences.join(" "),
            source_file: source_file.to_string(),
            page,
            chunk_index: index as u32,
            embedding: None,
        }
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, source_file: &str, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            if page.page == 0 {
                tracing::warn!("Skipping page 0 of {} (pages are 1-based)", source_file);
                continue;
            }
            chunks.extend(self.chunk_page(source_file, page));
        }

        tracing::debug!(
            "Chunked {} ({} pages) into {} chunks",
            source_file,
            pages.len(),
            chunks.len()
        );
        chunks
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 수 (UTF-8 바이트가 아닌 유니코드 스칼라 기준)
#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(SentenceChunker::with_defaults())
}

/// 문장 청커 생성 (설정 지정)
pub fn sentence_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(SentenceChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================
