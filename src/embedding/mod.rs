//! 임베딩 모듈 - Mistral API를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 임베딩 프로바이더입니다.
//! 시맨틱 검색과 리랭킹의 기반입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = MistralEmbedding::from_env(&ProviderConfig::default())?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::mistral::MistralClient;

pub use crate::mistral::{get_api_key, has_api_key};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
/// 실패는 재시도 없이 호출자에게 전달됩니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    ///
    /// 결과는 입력과 같은 순서, 같은 개수여야 합니다.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Mistral Embedding
// ============================================================================

/// mistral-embed 출력 차원
pub const MISTRAL_EMBED_DIMENSION: usize = 1024;

/// Mistral 임베딩 구현체
///
/// source: https://docs.mistral.ai/capabilities/embeddings/
#[derive(Debug, Clone)]
pub struct MistralEmbedding {
    client: MistralClient,
    model: String,
    batch_size: usize,
}

impl MistralEmbedding {
    pub fn new(client: MistralClient, config: &ProviderConfig) -> Self {
        Self {
            client,
            model: config.embed_model.clone(),
            batch_size: config.embed_batch_size.max(1),
        }
    }

    /// 환경변수(`MISTRAL_API_KEY`)에서 API 키를 읽어 생성
    pub fn from_env(config: &ProviderConfig) -> Result<Self> {
        let client = MistralClient::from_env(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(client, config))
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let body = self.client.post_json("embeddings", &request).await?;
        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        into_ordered_vectors(response, inputs.len())
    }
}

/// Mistral 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Mistral 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// 응답 항목을 index 순으로 정렬하고 개수 확인
fn into_ordered_vectors(mut response: EmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        anyhow::bail!(
            "Embedding response has {} vectors for {} inputs",
            response.data.len(),
            expected
        );
    }

    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for MistralEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; MISTRAL_EMBED_DIMENSION]);
        }

        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .context("Embedding response was empty")
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        let batches = texts.len().div_ceil(self.batch_size);

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!("Embedding batch {}/{} ({} texts)", i + 1, batches, batch.len());
            results.extend(self.request(batch).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        MISTRAL_EMBED_DIMENSION
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성 (Mistral API)
pub fn create_embedder(config: &ProviderConfig) -> Result<MistralEmbedding> {
    if !has_api_key() {
        anyhow::bail!(
            "MISTRAL_API_KEY not set.\n\
             Set: export MISTRAL_API_KEY=your-api-key\n\
             Get your API key at: https://console.mistral.ai/api-keys"
        );
    }

    let embedder = MistralEmbedding::from_env(config)?;
    tracing::info!(
        "Using Mistral embedding (model: {}, batch: {})",
        embedder.model,
        embedder.batch_size
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
