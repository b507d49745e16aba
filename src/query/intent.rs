//! 질의 의도 감지 (규칙 기반)

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]+\b").expect("Invalid regex"));

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howdy", "yo", "sup", "greetings",
    "good morning", "good afternoon", "good evening", "hi there",
];

const QUESTION_WORDS: &[&str] = &["what", "where", "when", "who", "why", "how", "which", "whose"];

/// 지식 질의로 보는 요청 표현
const KNOWLEDGE_CUES: &[&str] = &["tell me", "explain", "describe"];

/// 인사로 보는 최대 길이 (문자, 미만)
const GREETING_MAX_LEN: usize = 15;
/// 잡담으로 보는 최대 길이 (문자, 미만)
const CHAT_MAX_LEN: usize = 25;

/// 질의 의도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    GeneralChat,
    KnowledgeQuery,
}

/// 짧은 인사, 질문어 없는 짧은 잡담, 나머지는 지식 질의
pub fn detect_intent(query: &str) -> Intent {
    let text = query.trim();
    if text.is_empty() {
        return Intent::GeneralChat;
    }

    let lower = text.to_lowercase();
    let words: HashSet<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();
    let len = text.chars().count();

    let greeting = GREETINGS.contains(&lower.as_str()) || GREETINGS.iter().any(|g| words.contains(g));
    if len < GREETING_MAX_LEN && greeting {
        return Intent::Greeting;
    }

    if len < CHAT_MAX_LEN && !QUESTION_WORDS.iter().any(|q| words.contains(q)) {
        if KNOWLEDGE_CUES.iter().any(|cue| lower.contains(cue)) {
            return Intent::KnowledgeQuery;
        }
        return Intent::GeneralChat;
    }

    Intent::KnowledgeQuery
}
