//! Evidence Gate - 생성 진행 여부 판단
//!
//! 리랭크 1위 점수 하나만 봅니다 (집계 아님).
//! 임계값 미만이면 생성을 호출하지 않습니다.

use super::types::{ContextPassage, RankedResult};

/// 기본 임계값 (코사인 유사도)
pub const DEFAULT_THRESHOLD: f32 = 0.4;

/// 게이트 판정
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// 근거 충분 - 리랭크 결과 전체를 근거로 전달
    Accept(Vec<RankedResult>),
    /// 근거 부족 - 생성 금지
    Reject {
        /// 1위 점수 (결과가 비어있으면 None)
        top_score: Option<f32>,
    },
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept(_))
    }

    /// 인용 정보가 붙은 근거 구절 (Reject면 빈 목록)
    pub fn passages(&self) -> Vec<ContextPassage> {
        match self {
            GateDecision::Accept(results) => results.iter().map(ContextPassage::from).collect(),
            GateDecision::Reject { .. } => vec![],
        }
    }
}

/// 근거 게이트
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidenceGate {
    pub threshold: f32,
}

impl Default for EvidenceGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl EvidenceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// 1위 점수가 임계값 이상이면 Accept (경계 포함)
    pub fn gate(&self, reranked: Vec<RankedResult>) -> GateDecision {
        let top_score = reranked.first().map(|r| r.score);

        match top_score {
            Some(score) if score >= self.threshold => GateDecision::Accept(reranked),
            _ => {
                tracing::debug!(
                    "Evidence gate rejected: top score {:?} < threshold {}",
                    top_score,
                    self.threshold
                );
                GateDecision::Reject { top_score }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
