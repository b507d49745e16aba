//! Mistral API 공통 HTTP 클라이언트
//!
//! 임베딩과 채팅 어댑터가 공유합니다. 호출 간 최소 딜레이와
//! 429 응답에 대한 제한된 지수 백오프는 여기서만 처리합니다.
//! 검색 코어는 프로바이더 호출을 재시도하지 않습니다.
//!
//! source: https://docs.mistral.ai/api/

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Mistral API 기본 URL
pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";

/// API 키 환경변수
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Rate Limiter 설정 (무료 티어: 초당 1회)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MIN_DELAY_MS: u64 = 1000;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

// ============================================================================
// Rate Limiter
// ============================================================================

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay,
            last_request: None,
        }
    }

    /// 요청 가능할 때까지 대기
    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

// ============================================================================
// MistralClient
// ============================================================================

/// Mistral API 에러 응답
#[derive(Debug, Deserialize)]
struct MistralError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Mistral HTTP 클라이언트
#[derive(Debug, Clone)]
pub struct MistralClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl MistralClient {
    /// 새 클라이언트 생성
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Mistral API key is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: MISTRAL_API_BASE.to_string(),
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
                Duration::from_millis(MIN_DELAY_MS),
            ))),
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env(timeout: Duration) -> Result<Self> {
        Self::new(get_api_key()?, timeout)
    }

    /// 기본 URL 변경 (프록시, 호환 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// JSON POST 후 성공 응답 본문 반환
    ///
    /// 429와 전송 실패만 백오프 후 재시도하고 나머지 에러는 즉시 실패합니다.
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send request to {}: {}", path, e));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return Ok(text);
            }

            if status.as_u16() == 429 {
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                anyhow::bail!("Mistral API error ({}): {}", status, error_message(&text));
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Request failed after {} retries", MAX_RETRIES)))
    }
}

/// 에러 본문에서 메시지 추출
fn error_message(body: &str) -> String {
    match serde_json::from_str::<MistralError>(body) {
        Ok(MistralError {
            message: Some(message),
            ..
        }) => message,
        Ok(MistralError {
            detail: Some(detail),
            ..
        }) => detail.to_string(),
        _ => body.to_string(),
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (`MISTRAL_API_KEY`)
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            tracing::debug!("Using API key from {}", API_KEY_ENV);
            return Ok(key);
        }
    }

    anyhow::bail!(
        "API key not found. Set {} environment variable.\n\
         Get your API key at: https://console.mistral.ai/api-keys",
        API_KEY_ENV
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    std::env::var(API_KEY_ENV)
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message":"Unauthorized","request_id":"x"}"#),
            "Unauthorized"
        );
        assert!(error_message(r#"{"detail":[{"msg":"field required"}]}"#).contains("field required"));
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(MistralClient::new("  ".to_string(), Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = MistralClient::new("fake_key".to_string(), Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn test_rate_limiter_min_delay() {
        let mut limiter = RateLimiter::new(10, Duration::from_secs(60), Duration::from_millis(50));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
