//! 에러 타입
//!
//! 검색 코어가 호출자에게 돌려주는 에러 분류입니다.
//! 어댑터(HTTP, SQLite)와 CLI는 `anyhow`를 사용하고,
//! 코어 경계에서 [`RagError`]로 변환합니다.
//!
//! 근거 부족(insufficient evidence)은 에러가 아니라
//! [`AskOutcome::InsufficientEvidence`](crate::knowledge::AskOutcome) 결과입니다.

use thiserror::Error;

/// 검색 파이프라인 에러
#[derive(Debug, Clone, Error)]
pub enum RagError {
    /// 잘못된 입력 (빈 청크 텍스트, 임베딩 차원 불일치, 빈 질문 등)
    #[error("invalid input: {0}")]
    Input(String),

    /// 임베딩/생성 프로바이더 호출 실패
    #[error("provider failure: {0}")]
    Provider(String),

    /// 인덱스와 저장소 불일치 (재구축 시 검출)
    #[error("index inconsistency: {0}")]
    Consistency(String),

    /// 저장소 접근 실패
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RagError {
    /// anyhow 에러를 프로바이더 에러로 변환 (원인 체인 포함)
    pub fn provider(err: anyhow::Error) -> Self {
        RagError::Provider(format!("{err:#}"))
    }

    /// anyhow 에러를 저장소 에러로 변환 (원인 체인 포함)
    pub fn storage(err: anyhow::Error) -> Self {
        RagError::Storage(format!("{err:#}"))
    }
}

/// 코어 결과 타입
pub type RagResult<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_keeps_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("Failed to send embedding request");
        let rag = RagError::provider(err);
        let msg = rag.to_string();
        assert!(msg.contains("Failed to send embedding request"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_error_kinds_display() {
        assert!(RagError::Input("empty".into()).to_string().starts_with("invalid input"));
        assert!(RagError::Consistency("x".into())
            .to_string()
            .starts_with("index inconsistency"));
    }
}
