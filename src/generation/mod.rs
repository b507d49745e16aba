//! 답변 생성 모듈 - 근거 구절 기반 Chat Completion
//!
//! 근거 게이트를 통과한 경우에만 호출됩니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::knowledge::ContextPassage;
use crate::mistral::MistralClient;

/// 구절 구분자
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// RAG 프롬프트 지시문
const RAG_INSTRUCTIONS: &str = "You are a helpful assistant. Use the following context to answer the question. \
Synthesize and summarize the relevant information from the context. Be concise but thorough.

Only say you don't have enough information if the context is completely irrelevant to the question or empty. \
If the context is related (even partially), use it to give a helpful answer.";

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 답변 생성 프로바이더
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 근거 구절과 질문으로 답변 생성
    ///
    /// 빈 답변은 에러로 보고해야 합니다.
    async fn complete(&self, context: &[ContextPassage], question: &str) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

/// 근거 구절을 `[source_file p.page]: text` 형태로 묶어 프롬프트 생성
pub fn build_prompt(context: &[ContextPassage], question: &str) -> String {
    let context = context
        .iter()
        .map(|p| format!("[{} p.{}]: {}", p.source_file, p.page, p.text))
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR);

    // 구절 텍스트 안의 중괄호가 다시 치환되지 않도록 한 번에 조립
    format!("{RAG_INSTRUCTIONS}\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer:")
}

// ============================================================================
// Mistral Chat
// ============================================================================

/// Mistral Chat Completion 구현체
///
/// source: https://docs.mistral.ai/api/#tag/chat
#[derive(Debug, Clone)]
pub struct MistralChat {
    client: MistralClient,
    model: String,
    temperature: f32,
}

impl MistralChat {
    pub fn new(client: MistralClient, config: &ProviderConfig) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            temperature: config.temperature,
        }
    }

    /// 환경변수(`MISTRAL_API_KEY`)에서 API 키를 읽어 생성
    pub fn from_env(config: &ProviderConfig) -> Result<Self> {
        let client = MistralClient::from_env(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(client, config))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// 첫 번째 선택지의 내용 추출 (비어있으면 에러)
fn extract_answer(response: ChatResponse) -> Result<String> {
    let answer = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if answer.is_empty() {
        anyhow::bail!("Completion returned an empty answer");
    }
    Ok(answer)
}

#[async_trait]
impl CompletionProvider for MistralChat {
    async fn complete(&self, context: &[ContextPassage], question: &str) -> Result<String> {
        let prompt = build_prompt(context, question);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.temperature,
        };

        let body = self.client.post_json("chat/completions", &request).await?;
        let response: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse chat response")?;

        extract_answer(response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
