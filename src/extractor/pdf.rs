//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::ExtractError;
use crate::knowledge::PageText;

static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("Invalid regex"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").expect("Invalid regex"));

/// 암호화 PDF 트레일러 표식
const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// PDF 바이트에서 페이지별 텍스트 추출
///
/// 페이지 번호는 문서 순서대로 1부터 매기며, 빈 페이지는 번호를 유지한 채 제외합니다.
pub fn extract_pages_from_bytes(path: &Path, bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    if is_encrypted(bytes) {
        return Err(ExtractError::Encrypted(path.to_path_buf()));
    }

    // pdf-extract는 손상된 입력에서 panic할 수 있음
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));

    let text = match extracted {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            let message = e.to_string();
            if message.to_lowercase().contains("encrypt") {
                return Err(ExtractError::Encrypted(path.to_path_buf()));
            }
            return Err(ExtractError::Unreadable {
                path: path.to_path_buf(),
                reason: message,
            });
        }
        Err(_) => {
            return Err(ExtractError::Unreadable {
                path: path.to_path_buf(),
                reason: "PDF parser aborted on malformed input".to_string(),
            });
        }
    };

    let pages = split_pages(&text);
    if pages.is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
    }
    Ok(pages)
}

/// 폼피드(`\x0c`)로 페이지 분리 후 정규화
fn split_pages(text: &str) -> Vec<PageText> {
    text.split('\x0c')
        .enumerate()
        .map(|(i, raw)| PageText::new(i as u32 + 1, normalize_text(raw)))
        .filter(|page| !page.text.is_empty())
        .collect()
}

/// 공백/탭 연속은 공백 하나로, 빈 줄 연속은 줄바꿈 하나로
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.trim().to_string()
}

/// 마지막 트레일러(또는 XRef 스트림 사전) 이후에서만 `/Encrypt` 확인
///
/// 본문 스트림에 같은 문자열이 있어도 암호화로 보지 않습니다.
fn is_encrypted(bytes: &[u8]) -> bool {
    let Some(start) = rfind(bytes, b"trailer").or_else(|| rfind(bytes, b"/XRef")) else {
        return false;
    };

    bytes[start..]
        .windows(ENCRYPT_MARKER.len())
        .any(|window| window == ENCRYPT_MARKER)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

// ============================================================================
// Tests
// ============================================================================
