//! Chunk Store - rusqlite 기반 청크 저장소
//!
//! 저장소는 청크 집합의 유일한 원본입니다. 인덱스는 언제든 `load()` 결과로
//! 재구축할 수 있습니다.
//! 저장 위치: <data_dir>/chunks.db

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::config::get_data_dir;

use super::types::Chunk;

/// 기본 DB 파일 이름
pub const DB_FILE_NAME: &str = "chunks.db";

// ============================================================================
// Types
// ============================================================================

/// 문서별 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub source_file: String,
    pub chunk_count: usize,
    pub page_count: usize,
    /// 최초 수집 시각
    pub ingested_at: DateTime<Utc>,
}

/// 청크 저장소 trait
///
/// - `load`: 저장된 모든 청크 (저장 순서)
/// - `save`: 청크 추가
/// - `replace`: 전체 청크 집합 교체 (원자적)
pub trait ChunkStore: Send + Sync {
    fn load(&self) -> Result<Vec<Chunk>>;

    fn save(&self, chunks: &[Chunk]) -> Result<()>;

    fn replace(&self, chunks: &[Chunk]) -> Result<()>;

    /// 문서 목록 (최초 수집 순)
    fn documents(&self) -> Result<Vec<DocumentSummary>>;

    /// 저장소 이름 (로깅용)
    fn name(&self) -> &'static str;
}

// ============================================================================
// SqliteChunkStore
// ============================================================================

/// SQLite 청크 저장소
///
/// 임베딩은 little-endian f32 BLOB으로 저장합니다.
pub struct SqliteChunkStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteChunkStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 기본 위치에서 열기 (<data_dir>/chunks.db)
    pub fn open_default() -> Result<Self> {
        Self::open(&get_data_dir().join(DB_FILE_NAME))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_file TEXT NOT NULL,
                page INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL,
                UNIQUE(source_file, page, chunk_index)
            )",
            [],
        )
        .context("Failed to create chunks table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_file)",
            [],
        )
        .context("Failed to create source index")?;

        tracing::debug!("Chunk store initialized at {:?}", self.db_path);
        Ok(())
    }
}

impl ChunkStore for SqliteChunkStore {
    fn load(&self) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT source_file, page, chunk_index, text, embedding FROM chunks ORDER BY id",
        )?;

        let chunks = stmt
            .query_map([], |row| {
                let embedding = row
                    .get::<_, Option<Vec<u8>>>(4)?
                    .map(|bytes| decode_embedding(&bytes))
                    .transpose()?;
                Ok(Chunk {
                    source_file: row.get(0)?,
                    page: row.get(1)?,
                    chunk_index: row.get(2)?,
                    text: row.get(3)?,
                    embedding,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read chunks")?;

        Ok(chunks)
    }

    fn save(&self, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        insert_chunks(&tx, chunks, &HashMap::new(), &now)?;

        tx.commit().context("Failed to commit chunks")?;
        tracing::debug!("Saved {} chunks", chunks.len());
        Ok(())
    }

    fn replace(&self, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        // 남는 문서의 최초 수집 시각 보존
        let ingested: HashMap<String, String> = {
            let mut stmt =
                tx.prepare("SELECT source_file, MIN(created_at) FROM chunks GROUP BY source_file")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        tx.execute("DELETE FROM chunks", [])
            .context("Failed to clear chunks")?;
        insert_chunks(&tx, chunks, &ingested, &now)?;

        tx.commit().context("Failed to commit replacement")?;
        tracing::debug!("Replaced store contents with {} chunks", chunks.len());
        Ok(())
    }

    fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT source_file, COUNT(*), COUNT(DISTINCT page), MIN(created_at)
             FROM chunks
             GROUP BY source_file
             ORDER BY MIN(id)",
        )?;

        let docs = stmt
            .query_map([], |row| {
                Ok(DocumentSummary {
                    source_file: row.get(0)?,
                    chunk_count: row.get::<_, i64>(1)? as usize,
                    page_count: row.get::<_, i64>(2)? as usize,
                    ingested_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(docs)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// ============================================================================
// MemoryChunkStore
// ============================================================================

#[derive(Default)]
struct MemoryState {
    chunks: Vec<Chunk>,
    ingested: HashMap<String, DateTime<Utc>>,
}

/// 메모리 청크 저장소 (테스트, 임시 세션용)
#[derive(Default)]
pub struct MemoryChunkStore {
    state: Mutex<MemoryState>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }
}

impl ChunkStore for MemoryChunkStore {
    fn load(&self) -> Result<Vec<Chunk>> {
        Ok(self.lock()?.chunks.clone())
    }

    fn save(&self, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.lock()?;
        let now = Utc::now();
        for chunk in chunks {
            state.ingested.entry(chunk.source_file.clone()).or_insert(now);
        }
        state.chunks.extend_from_slice(chunks);
        Ok(())
    }

    fn replace(&self, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let sources: BTreeSet<&str> = chunks.iter().map(|c| c.source_file.as_str()).collect();
        state.ingested.retain(|source, _| sources.contains(source.as_str()));
        for source in sources {
            state.ingested.entry(source.to_string()).or_insert(now);
        }
        state.chunks = chunks.to_vec();
        Ok(())
    }

    fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let state = self.lock()?;

        let mut order: Vec<&str> = Vec::new();
        let mut grouped: BTreeMap<&str, (usize, BTreeSet<u32>)> = BTreeMap::new();
        for chunk in &state.chunks {
            let entry = grouped.entry(&chunk.source_file).or_insert_with(|| {
                order.push(&chunk.source_file);
                (0, BTreeSet::new())
            });
            entry.0 += 1;
            entry.1.insert(chunk.page);
        }

        Ok(order
            .into_iter()
            .map(|source| {
                let (chunk_count, pages) = &grouped[source];
                DocumentSummary {
                    source_file: source.to_string(),
                    chunk_count: *chunk_count,
                    page_count: pages.len(),
                    ingested_at: state.ingested.get(source).copied().unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn insert_chunks(
    tx: &rusqlite::Transaction<'_>,
    chunks: &[Chunk],
    ingested: &HashMap<String, String>,
    now: &str,
) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO chunks (source_file, page, chunk_index, text, embedding, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for chunk in chunks {
        let created_at = ingested
            .get(&chunk.source_file)
            .map(String::as_str)
            .unwrap_or(now);
        let embedding = chunk.embedding.as_deref().map(encode_embedding);

        stmt.execute(params![
            chunk.source_file,
            chunk.page,
            chunk.chunk_index,
            chunk.text,
            embedding,
            created_at,
        ])
        .with_context(|| format!("Failed to insert chunk {}", chunk.key()))?;
    }
    Ok(())
}

fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// 길이가 4의 배수가 아니면 손상된 BLOB으로 보고 에러
fn decode_embedding(bytes: &[u8]) -> rusqlite::Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Blob,
            format!("embedding blob of {} bytes is not a multiple of 4", bytes.len()).into(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
