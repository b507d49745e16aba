//! 거절 판정 - 개인정보(PII), 법률/의료 자문 요청

use std::sync::LazyLock;

use regex::Regex;

static PII_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("Invalid regex"), "SSN"),
        (Regex::new(r"\b\d{16}\b").expect("Invalid regex"), "credit card"),
        (
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("Invalid regex"),
            "email",
        ),
    ]
});

/// 법률/의료 키워드 (단어 경계 매칭)
static ADVICE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(legal advice|lawsuit|sue|attorney|lawyer|medical advice|diagnose|prescription|doctor said)\b",
    )
    .expect("Invalid regex")
});

pub const ADVICE_MESSAGE: &str = "This system provides information from your documents only and does not \
constitute legal or medical advice. Consult a qualified professional for such matters.";

/// 거절 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// 개인정보 포함 (라벨: "SSN", "credit card", "email")
    Pii { label: &'static str },
    /// 법률/의료 자문 요청
    Advice,
}

impl Refusal {
    /// 사용자에게 보여줄 거절 메시지
    pub fn message(&self) -> String {
        match self {
            Refusal::Pii { label } => format!(
                "I cannot process queries that appear to contain {}. \
                 Please rephrase without sharing personal information.",
                label
            ),
            Refusal::Advice => ADVICE_MESSAGE.to_string(),
        }
    }
}

/// PII 패턴을 먼저 검사하고, 그다음 자문 키워드를 검사
pub fn check_refusal(query: &str) -> Option<Refusal> {
    let text = query.trim();

    if let Some((_, label)) = PII_PATTERNS.iter().find(|(re, _)| re.is_match(text)) {
        return Some(Refusal::Pii { label: *label });
    }

    if ADVICE_KEYWORDS.is_match(&text.to_lowercase()) {
        return Some(Refusal::Advice);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pii_detection() {
        assert_eq!(
            check_refusal("my ssn is 123-45-6789"),
            Some(Refusal::Pii { label: "SSN" })
        );
        assert_eq!(
            check_refusal("card 4111111111111111 expired"),
            Some(Refusal::Pii { label: "credit card" })
        );
        assert_eq!(
            check_refusal("contact john.doe@example.com please"),
            Some(Refusal::Pii { label: "email" })
        );
    }

    #[test]
    fn test_advice_detection() {
        assert_eq!(check_refusal("Should I sue my landlord?"), Some(Refusal::Advice));
        assert_eq!(check_refusal("Can you DIAGNOSE this rash"), Some(Refusal::Advice));
        assert_eq!(check_refusal("I need legal advice on this"), Some(Refusal::Advice));
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        // "issue"는 "sue"가 아님
        assert_eq!(check_refusal("What is the main issue in chapter 2?"), None);
    }

    #[test]
    fn test_pii_takes_precedence() {
        assert_eq!(
            check_refusal("lawyer email: a@b.co"),
            Some(Refusal::Pii { label: "email" })
        );
    }

    #[test]
    fn test_messages() {
        assert!(Refusal::Pii { label: "SSN" }.message().contains("contain SSN"));
        assert!(Refusal::Advice.message().contains("legal or medical advice"));
        assert_eq!(check_refusal("What does the report conclude?"), None);
    }
}
