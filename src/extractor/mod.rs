//! 콘텐츠 추출 모듈
//!
//! PDF 파일에서 페이지별 정규화 텍스트를 추출합니다.
//! 읽을 수 없거나 암호화된 파일은 panic 없이 [`ExtractError`]로 보고합니다.

pub mod pdf;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::knowledge::PageText;

pub use pdf::normalize_text;

/// 추출 에러
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("not a PDF file: {0:?}")]
    NotPdf(PathBuf),

    #[error("PDF is password-protected and cannot be processed: {0:?}")]
    Encrypted(PathBuf),

    #[error("cannot read PDF {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// 추출된 문서
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 문서 식별자 (파일 이름)
    pub source_file: String,
    /// 비어있지 않은 페이지 (문서 순서)
    pub pages: Vec<PageText>,
}

/// 문서 식별자 (파일 이름)
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// PDF 파일에서 페이지별 텍스트 추출
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, ExtractError> {
    if !path.is_file() {
        return Err(ExtractError::NotFound(path.to_path_buf()));
    }

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ExtractError::NotPdf(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|e| ExtractError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    pdf::extract_pages_from_bytes(path, &bytes)
}

/// 비동기 추출 (CPU 바운드이므로 spawn_blocking 사용)
pub async fn extract_document(path: &Path) -> Result<ExtractedDocument, ExtractError> {
    let owned = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || extract_pages(&owned))
        .await
        .map_err(|e| ExtractError::Unreadable {
            path: path.to_path_buf(),
            reason: format!("extraction task failed: {}", e),
        })??;

    Ok(ExtractedDocument {
        source_file: document_name(path),
        pages,
    })
}

// ============================================================================
// Tests
// ============================================================================
