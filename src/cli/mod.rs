//! CLI 모듈
//!
//! docqa CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{CollectionStats, CollectorConfig, PdfCollector};
use crate::config::{get_data_dir, RagConfig};
use crate::embedding::has_api_key;
use crate::extractor::extract_document;
use crate::knowledge::{
    AskOutcome, ChunkStore, GateDecision, HybridRetriever, IndexStats, SearchIndex,
    SqliteChunkStore,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docqa")]
#[command(version, about = "PDF 문서 질의응답 (하이브리드 검색 + 근거 게이트)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF 파일 또는 폴더를 지식베이스에 추가
    Ingest {
        /// PDF 파일 또는 폴더 경로
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 숨김 파일 포함
        #[arg(long)]
        include_hidden: bool,

        /// .gitignore 무시
        #[arg(long)]
        no_ignore: bool,
    },

    /// 문서 기반 질문 응답
    Ask {
        /// 질문
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 검색 결과 확인 (답변 생성 없음)
    Search {
        /// 검색 쿼리
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// 후보 풀 출력 개수
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// 저장된 문서 목록
    List,

    /// 문서 삭제
    Delete {
        /// 삭제할 문서 이름 (예: report.pdf)
        source_file: String,
    },

    /// 상태 확인
    Status,

    /// 저장소에서 인덱스 재구축 및 검증
    Reindex,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            paths,
            include_hidden,
            no_ignore,
        } => cmd_ingest(paths, include_hidden, no_ignore).await,
        Commands::Ask { question, json } => cmd_ask(&question.join(" "), json).await,
        Commands::Search { query, limit } => cmd_search(&query.join(" "), limit).await,
        Commands::List => cmd_list(),
        Commands::Delete { source_file } => cmd_delete(&source_file),
        Commands::Status => cmd_status(),
        Commands::Reindex => cmd_reindex(),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
///
/// PDF를 추출, 청킹, 임베딩하여 저장합니다. 같은 이름의 문서는 교체됩니다.
async fn cmd_ingest(paths: Vec<PathBuf>, include_hidden: bool, no_ignore: bool) -> Result<()> {
    require_api_key()?;

    let collector = PdfCollector::new(CollectorConfig {
        include_hidden,
        respect_gitignore: !no_ignore,
        ..Default::default()
    });
    let files = collector.collect(&paths)?;

    if files.is_empty() {
        println!("[!] 수집할 PDF 파일이 없습니다.");
        return Ok(());
    }

    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let retriever = HybridRetriever::open_default().context("HybridRetriever 초기화 실패")?;

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, collected_file) in files.iter().enumerate() {
        let file_name = collected_file
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        print!("[{}/{}] {}... ", i + 1, files.len(), file_name);

        let document = match extract_document(&collected_file.path).await {
            Ok(d) => d,
            Err(e) => {
                println!("추출 실패: {}", e);
                error_count += 1;
                continue;
            }
        };

        match retriever.ingest(&document.source_file, &document.pages).await {
            Ok(report) if report.chunk_count == 0 => {
                println!("건너뜀 (텍스트 없음)");
            }
            Ok(report) => {
                let action = if report.replaced { "교체" } else { "추가" };
                println!(
                    "{} ({} 페이지, {} 청크)",
                    action,
                    document.pages.len(),
                    report.chunk_count
                );
                success_count += 1;
            }
            Err(e) => {
                println!("저장 실패: {}", e);
                error_count += 1;
            }
        }
    }

    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success_count, error_count);

    Ok(())
}

/// 질문 응답 명령어 (ask)
async fn cmd_ask(question: &str, json: bool) -> Result<()> {
    require_api_key()?;

    let retriever = HybridRetriever::open_default().context("HybridRetriever 초기화 실패")?;
    let outcome = retriever.ask(question).await.context("질문 처리 실패")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        AskOutcome::Answered { answer, citations } => {
            println!("{}", answer);
            println!();
            println!("출처:");
            for passage in &citations {
                println!(
                    "  - {} p.{} [점수: {:.3}]",
                    passage.source_file, passage.page, passage.score
                );
            }
        }
        AskOutcome::InsufficientEvidence { top_score } => {
            let threshold = retriever.config().search.threshold;
            match top_score {
                Some(score) => println!(
                    "[!] 문서에서 충분한 근거를 찾지 못했습니다 (최고 점수 {:.3} < 임계값 {:.2})",
                    score, threshold
                ),
                None => println!("[!] 검색할 문서가 없습니다. 먼저 `docqa ingest`로 PDF를 추가하세요."),
            }
        }
        AskOutcome::Refused { message }
        | AskOutcome::Greeting { message }
        | AskOutcome::Chat { message } => println!("{}", message),
    }

    Ok(())
}

/// 검색 명령어 (search)
///
/// 리랭크 결과와 게이트 판정을 보여줍니다.
async fn cmd_search(query: &str, limit: usize) -> Result<()> {
    require_api_key()?;

    println!("[*] 검색 중: \"{}\"", query);

    let retriever = HybridRetriever::open_default().context("HybridRetriever 초기화 실패")?;
    let retrieval = retriever.retrieve(query).await.context("검색 실패")?;

    if retrieval.query != query.trim() {
        println!("    확장된 질의: \"{}\"", retrieval.query);
    }

    if retrieval.fused.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 리랭크 결과 ({} 건):\n", retrieval.reranked.len());
    for result in &retrieval.reranked {
        println!(
            "{}. [유사도: {:.4}] {} p.{} #{}",
            result.rank + 1,
            result.score,
            result.chunk.source_file,
            result.chunk.page,
            result.chunk.chunk_index
        );
        println!("   {}", truncate_text(&result.chunk.text, 200));
        println!();
    }

    println!("[*] RRF 후보 풀 (상위 {} / {}):", limit.min(retrieval.fused.len()), retrieval.fused.len());
    for result in retrieval.fused.iter().take(limit) {
        println!(
            "    {:>2}. [RRF: {:.4}] {} p.{} #{}",
            result.rank + 1,
            result.score,
            result.chunk.source_file,
            result.chunk.page,
            result.chunk.chunk_index
        );
    }
    println!();

    match retrieval.decision {
        GateDecision::Accept(_) => println!("[OK] 근거 게이트: 통과"),
        GateDecision::Reject { top_score } => println!(
            "[!] 근거 게이트: 거부 (최고 점수 {}, 임계값 {:.2})",
            top_score
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "-".to_string()),
            retriever.config().search.threshold
        ),
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list() -> Result<()> {
    let store = open_store()?;
    let docs = store.documents().context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        println!("  {}", truncate_text(&doc.source_file, 60));
        println!(
            "        {} | {} 페이지 | {} 청크",
            doc.ingested_at.format("%Y-%m-%d %H:%M"),
            doc.page_count,
            doc.chunk_count
        );
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
///
/// 저장소에서 문서의 모든 청크를 삭제합니다. 없는 문서는 아무것도 하지 않습니다.
fn cmd_delete(source_file: &str) -> Result<()> {
    let store = open_store()?;

    let mut chunks = store.load().context("청크 조회 실패")?;
    let before = chunks.len();
    chunks.retain(|c| c.source_file != source_file);
    let removed = before - chunks.len();

    if removed == 0 {
        println!("[!] '{}' 문서를 찾을 수 없습니다", source_file);
        return Ok(());
    }

    store.replace(&chunks).context("문서 삭제 실패")?;
    let stats = build_index(&store)?;

    println!("[OK] '{}' 삭제됨 ({} 청크)", source_file, removed);
    println!(
        "     남은 문서: {} 건, {} 청크",
        stats.document_count, stats.chunk_count
    );

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status() -> Result<()> {
    println!("docqa v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export MISTRAL_API_KEY=your-key");
    }

    match RagConfig::load(&data_dir) {
        Ok(config) => {
            println!(
                "[*] 청크: {}자 (오버랩 {}자) | 검색 깊이: {} | 후보 풀: {} | 최종: {} | 임계값: {:.2}",
                config.chunking.chunk_size,
                config.chunking.overlap,
                config.search.search_k,
                config.search.pool_size,
                config.search.final_size,
                config.search.threshold
            );
        }
        Err(e) => println!("[!] 설정 오류: {:#}", e),
    }

    match open_store().and_then(|store| build_index(&store)) {
        Ok(stats) => print_index_stats(&stats),
        Err(e) => println!("[!] 인덱스 구축 실패: {:#}", e),
    }

    Ok(())
}

/// 재구축 명령어 (reindex)
///
/// 저장된 청크 전체로 인덱스를 다시 만들며 저장소 데이터를 검증합니다.
fn cmd_reindex() -> Result<()> {
    let store = open_store()?;
    println!("[*] 저장소에서 인덱스 재구축 중: {}", store.db_path().display());

    let stats = build_index(&store)?;
    println!("[OK] 재구축 완료");
    print_index_stats(&stats);

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export MISTRAL_API_KEY=your-api-key\n\n\
             API 키 발급: https://console.mistral.ai/api-keys"
        );
    }
    Ok(())
}

fn open_store() -> Result<SqliteChunkStore> {
    SqliteChunkStore::open_default().context("ChunkStore 열기 실패")
}

/// 저장소 전체로 인덱스 구축 (검증 포함)
fn build_index(store: &SqliteChunkStore) -> Result<IndexStats> {
    let config = RagConfig::load(&get_data_dir())?;
    let chunks = store.load().context("청크 조회 실패")?;

    let mut index = SearchIndex::new(config.search.bm25_k1, config.search.bm25_b);
    index.rebuild(chunks).context("인덱스 재구축 실패")?;
    Ok(index.stats())
}

fn print_index_stats(stats: &IndexStats) {
    println!(
        "[OK] 인덱스: 문서 {} 건, 청크 {} 개, 어휘 {} 개",
        stats.document_count, stats.chunk_count, stats.vocabulary_size
    );
    println!(
        "     평균 청크 길이: {:.1} 토큰 | 임베딩 차원: {}",
        stats.average_length,
        stats
            .dimension
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
