//! 설정 모듈
//!
//! 기본값 → `config.json` (데이터 디렉토리) → 환경변수 순으로 덮어씁니다.
//!
//! ```text
//! DOCQA_DATA_DIR       데이터 디렉토리
//! DOCQA_CHUNK_SIZE     청크 목표 길이 (문자)
//! DOCQA_CHUNK_OVERLAP  청크 오버랩 길이 (문자)
//! DOCQA_SEARCH_K       인덱스별 검색 깊이
//! DOCQA_POOL_SIZE      RRF 후보 풀 크기
//! DOCQA_FINAL_SIZE     리랭크 후 최종 개수
//! DOCQA_THRESHOLD      근거 게이트 임계값
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::knowledge::ChunkConfig;

/// 설정 파일 이름 (데이터 디렉토리 내)
pub const CONFIG_FILE_NAME: &str = "config.json";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로
///
/// `DOCQA_DATA_DIR`가 있으면 사용하고, 없으면 `~/.local/share/.docqa-rag/`
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCQA_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docqa-rag")
}

// ============================================================================
// Config Types
// ============================================================================

/// 검색 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 벡터/키워드 인덱스 각각의 검색 깊이
    pub search_k: usize,
    /// BM25 포화 파라미터
    pub bm25_k1: f32,
    /// BM25 길이 정규화 파라미터
    pub bm25_b: f32,
    /// RRF 상수 k
    pub rrf_k: f32,
    /// RRF 결과 풀 크기
    pub pool_size: usize,
    /// 리랭크 후 최종 결과 수
    pub final_size: usize,
    /// 근거 게이트 임계값 (코사인 유사도)
    pub threshold: f32,
    /// 질의 확장 (약어 확장, 정의형 질문 재작성)
    pub expand_queries: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_k: 20,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            rrf_k: 60.0,
            pool_size: 20,
            final_size: 5,
            threshold: 0.4,
            expand_queries: false,
        }
    }
}

/// 외부 프로바이더 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 임베딩 모델 이름
    pub embed_model: String,
    /// 채팅 모델 이름
    pub chat_model: String,
    /// 생성 온도
    pub temperature: f32,
    /// 임베딩 배치 크기
    pub embed_batch_size: usize,
    /// HTTP 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            embed_model: "mistral-embed".to_string(),
            chat_model: "mistral-small-latest".to_string(),
            temperature: 0.2,
            embed_batch_size: 32,
            timeout_secs: 30,
        }
    }
}

/// 전체 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkConfig,
    pub search: SearchConfig,
    pub providers: ProviderConfig,
}

impl RagConfig {
    /// 데이터 디렉토리에서 설정 로드
    ///
    /// `config.json`이 없으면 기본값을 사용합니다.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    /// 환경변수 덮어쓰기
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<usize>("DOCQA_CHUNK_SIZE")? {
            self.chunking.chunk_size = v;
        }
        if let Some(v) = env_parse::<usize>("DOCQA_CHUNK_OVERLAP")? {
            self.chunking.overlap = v;
        }
        if let Some(v) = env_parse::<usize>("DOCQA_SEARCH_K")? {
            self.search.search_k = v;
        }
        if let Some(v) = env_parse::<usize>("DOCQA_POOL_SIZE")? {
            self.search.pool_size = v;
        }
        if let Some(v) = env_parse::<usize>("DOCQA_FINAL_SIZE")? {
            self.search.final_size = v;
        }
        if let Some(v) = env_parse::<f32>("DOCQA_THRESHOLD")? {
            self.search.threshold = v;
        }
        Ok(())
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }
        if self.search.search_k == 0 || self.search.pool_size == 0 || self.search.final_size == 0 {
            bail!("search_k, pool_size and final_size must be greater than 0");
        }
        if !(-1.0..=1.0).contains(&self.search.threshold) {
            bail!("threshold must be within [-1, 1], got {}", self.search.threshold);
        }
        if self.search.rrf_k < 0.0 {
            bail!("rrf_k must not be negative");
        }
        if self.providers.embed_batch_size == 0 {
            bail!("embed_batch_size must be greater than 0");
        }
        Ok(())
    }
}

/// 환경변수를 파싱 (없거나 비어있으면 None)
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================
