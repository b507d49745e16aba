//! Query 모듈 - 검색 전 질의 분류
//!
//! - intent: 인사 / 잡담 / 지식 질의 감지
//! - refusal: 개인정보, 법률/의료 자문 요청 거절
//! - transform: 약어 확장, 정의형 질문 재작성
//!
//! 분류기는 [`QueryClassifier`] trait으로 교체할 수 있습니다.

mod intent;
mod refusal;
mod transform;

pub use intent::{detect_intent, Intent};
pub use refusal::{check_refusal, Refusal};
pub use transform::transform_query;

/// 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Greeting,
    Chat,
    PiiRefused { label: &'static str },
    AdviceRefused,
    KnowledgeQuery,
}

impl Decision {
    /// 검색 없이 바로 돌려줄 응답 (지식 질의면 None)
    pub fn canned_reply(&self) -> Option<String> {
        match self {
            Decision::Greeting => Some(
                "Hello! Ask me anything about the documents you have ingested.".to_string(),
            ),
            Decision::Chat => Some(
                "I answer questions about your documents. Try asking something specific about them."
                    .to_string(),
            ),
            Decision::PiiRefused { label } => Some(Refusal::Pii { label: *label }.message()),
            Decision::AdviceRefused => Some(Refusal::Advice.message()),
            Decision::KnowledgeQuery => None,
        }
    }
}

/// 질의 분류기
pub trait QueryClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Decision;
}

/// 규칙 기반 분류기 (거절 판정 → 의도 감지 순)
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl QueryClassifier for RuleClassifier {
    fn classify(&self, question: &str) -> Decision {
        if let Some(refusal) = check_refusal(question) {
            return match refusal {
                Refusal::Pii { label } => Decision::PiiRefused { label },
                Refusal::Advice => Decision::AdviceRefused,
            };
        }

        match detect_intent(question) {
            Intent::Greeting => Decision::Greeting,
            Intent::GeneralChat => Decision::Chat,
            Intent::KnowledgeQuery => Decision::KnowledgeQuery,
        }
    }
}
