//! 질의 변환 - 약어 확장, 정의형 질문 재작성
//!
//! `search.expand_queries`가 켜져 있을 때만 검색 질의에 적용됩니다.

use std::sync::LazyLock;

use regex::Regex;

const ACRONYMS: &[(&str, &str)] = &[
    ("ai", "artificial intelligence"),
    ("ml", "machine learning"),
    ("nlp", "natural language processing"),
    ("api", "application programming interface"),
    ("rag", "retrieval augmented generation"),
    ("llm", "large language model"),
];

/// 정의형 질문 패턴 (첫 번째 매칭만 적용)
static QUESTION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)what\s+is\s+(.+)\?*$", "definition explanation of ${1}"),
        (r"(?i)what\s+are\s+(.+)\?*$", "definition explanation of ${1}"),
        (r"(?i)define\s+(.+)$", "definition of ${1}"),
        (r"(?i)explain\s+(.+)$", "explanation of ${1}"),
        (r"(?i)how\s+does\s+(.+)\s+work\?*$", "how ${1} works mechanism process"),
        (r"(?i)why\s+(.+)\?*$", "reasons causes for ${1}"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("Invalid regex"), replacement))
    .collect()
});

/// 약어 확장 후 정의형 질문 재작성
pub fn transform_query(query: &str) -> String {
    let text = query.trim();
    if text.is_empty() {
        return String::new();
    }

    let mut text = expand_acronyms(text);

    if let Some((re, replacement)) = QUESTION_PATTERNS.iter().find(|(re, _)| re.is_match(&text)) {
        text = re.replace(&text, *replacement).into_owned();
    }

    text.trim().to_string()
}

/// 단독 토큰으로 등장한 약어 앞에 풀이를 붙임 (`RAG` → `retrieval augmented generation RAG`)
fn expand_acronyms(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let clean: String = word
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase();

            match ACRONYMS.iter().find(|(acronym, _)| *acronym == clean) {
                Some((_, expansion)) => format!("{} {}", expansion, word),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acronym_expansion() {
        assert_eq!(
            expand_acronyms("compare LLM and NLP tools"),
            "compare large language model LLM and natural language processing NLP tools"
        );
        assert_eq!(expand_acronyms("main aim"), "main aim");
    }

    #[test]
    fn test_definition_rewrite() {
        assert_eq!(
            transform_query("What is RAG?"),
            "definition explanation of retrieval augmented generation RAG?"
        );
        assert_eq!(transform_query("define entropy"), "definition of entropy");
        assert_eq!(
            transform_query("How does photosynthesis work?"),
            "how photosynthesis works mechanism process"
        );
    }

    #[test]
    fn test_only_first_pattern_applies() {
        // "explain"보다 "what is"가 먼저
        assert_eq!(
            transform_query("what is explain mode"),
            "definition explanation of explain mode"
        );
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(transform_query("  revenue by quarter "), "revenue by quarter");
        assert_eq!(transform_query("   "), "");
    }
}
