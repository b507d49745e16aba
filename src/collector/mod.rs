//! 파일 수집 모듈
//!
//! 로컬 파일 및 폴더에서 PDF 파일을 수집합니다.
//! .gitignore 패턴을 존중하고, 숨김 파일과 큰 파일은 건너뜁니다.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use ignore::WalkBuilder;

/// 경로가 PDF 확장자인지 확인 (대소문자 무시)
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 파일 크기 (바이트)
    pub size: u64,
    /// 수정 시간
    pub modified_at: Option<SystemTime>,
}

impl CollectedFile {
    /// 파일에서 CollectedFile 생성 (PDF가 아니면 None)
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        if !is_pdf(&path) {
            return Ok(None);
        }

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            size: metadata.len(),
            modified_at: metadata.modified().ok(),
        }))
    }
}

// ============================================================================
// PDF Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// PDF 수집기
pub struct PdfCollector {
    config: CollectorConfig,
}

impl PdfCollector {
    /// 새 수집기 생성
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 파일/폴더 목록에서 PDF 수집 (중복 제거, 입력 순서 유지)
    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<CollectedFile>> {
        let mut files: Vec<CollectedFile> = Vec::new();

        for path in paths {
            let collected = if path.is_dir() {
                self.collect_directory(path)?
            } else {
                self.collect_file(path)?.into_iter().collect()
            };

            for file in collected {
                if !files.iter().any(|f| f.path == file.path) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }

    /// 단일 파일 수집
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }

        if !abs_path.is_file() {
            anyhow::bail!("Not a file: {:?}", abs_path);
        }

        let file = CollectedFile::from_path(abs_path)?;
        if file.is_none() {
            tracing::warn!("Skipping non-PDF file: {:?}", path);
        }

        Ok(file.filter(|f| self.should_include(f)))
    }

    /// 폴더 재귀 수집
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("Directory not found: {:?}", abs_path);
        }

        if !abs_path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", abs_path);
        }

        let mut files = Vec::new();

        // ignore 크레이트로 .gitignore 지원
        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) => {
                    if self.should_include(&file) {
                        files.push(file);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to collect file: {}", e);
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!("Collected {} PDF files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }
        true
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[CollectedFile]) -> Self {
        Self {
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, bytes: usize) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, vec![b'x'; bytes]).unwrap();
        path
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("a.pdf")));
        assert!(is_pdf(Path::new("A.PDF")));
        assert!(!is_pdf(Path::new("a.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn test_collect_directory_only_pdfs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.pdf", 10);
        touch(dir.path(), "a.pdf", 20);
        touch(dir.path(), "notes.txt", 5);
        touch(dir.path(), "nested/c.PDF", 5);
        touch(dir.path(), ".hidden/d.pdf", 5);

        let files = PdfCollector::with_defaults()
            .collect_directory(dir.path())
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.PDF"]);
        assert_eq!(
            CollectionStats::from_files(&files),
            CollectionStats {
                total_files: 3,
                total_size: 35
            }
        );
    }

    #[test]
    fn test_max_file_size() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "big.pdf", 100);
        touch(dir.path(), "small.pdf", 10);

        let collector = PdfCollector::new(CollectorConfig {
            max_file_size: 50,
            ..CollectorConfig::default()
        });
        let files = collector.collect_directory(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_collect_mixed_inputs_dedupes() {
        let dir = TempDir::new().unwrap();
        let file = touch(dir.path(), "a.pdf", 10);
        let text = touch(dir.path(), "a.txt", 10);

        let files = PdfCollector::with_defaults()
            .collect(&[file.clone(), dir.path().to_path_buf(), text])
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, file);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(PdfCollector::with_defaults()
            .collect(&[PathBuf::from("/nonexistent/x.pdf")])
            .is_err());
    }
}
