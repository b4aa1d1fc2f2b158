//! SQLite-backed vector index for transcript segments.
//!
//! One row per indexed segment: id, payload text, embedding as a
//! little-endian f32 blob, and retrieval metadata columns. Queries are
//! brute-force cosine scans; ties on distance resolve by insertion order
//! (rowid), so results are deterministic for identical index state.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{SegmentMetadata, VectorEntry};

/// Errors from the vector index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vector_entries (
    id          TEXT PRIMARY KEY,
    media_id    TEXT NOT NULL,
    document    TEXT NOT NULL,
    embedding   BLOB NOT NULL,
    start_time  REAL NOT NULL,
    end_time    REAL NOT NULL,
    confidence  REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_vector_entries_media ON vector_entries(media_id);
";

/// SQLite-backed vector index
pub struct VectorIndex {
    conn: Mutex<Connection>,
}

impl VectorIndex {
    /// Open (or create) the index at the given path.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory index (tests).
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or update an entry. Updates keep the original insertion order.
    pub fn upsert(&self, entry: &VectorEntry) -> Result<(), IndexError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO vector_entries
                 (id, media_id, document, embedding, start_time, end_time, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 media_id = excluded.media_id,
                 document = excluded.document,
                 embedding = excluded.embedding,
                 start_time = excluded.start_time,
                 end_time = excluded.end_time,
                 confidence = excluded.confidence",
            params![
                entry.id.to_string(),
                entry.metadata.media_id.to_string(),
                entry.document,
                embedding_to_blob(&entry.embedding),
                entry.metadata.start_time,
                entry.metadata.end_time,
                entry.metadata.confidence,
            ],
        )?;
        Ok(())
    }

    /// Fetch one entry by segment id.
    pub fn get(&self, id: Uuid) -> Result<Option<VectorEntry>, IndexError> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row(
                "SELECT id, media_id, document, embedding, start_time, end_time, confidence
                 FROM vector_entries WHERE id = ?1",
                params![id.to_string()],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Nearest neighbors by cosine distance, closest first.
    ///
    /// Returns at most `limit` `(entry, distance)` pairs. Equal distances
    /// keep insertion order (rows are scanned in rowid order and the sort is
    /// stable).
    pub fn nearest(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(VectorEntry, f64)>, IndexError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, media_id, document, embedding, start_time, end_time, confidence
             FROM vector_entries ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;

        let mut scored: Vec<(VectorEntry, f64)> = Vec::new();
        for row in rows {
            let entry = row?;
            let distance = cosine_distance(query, &entry.embedding);
            scored.push((entry, distance));
        }

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Delete every entry referencing the given media id.
    /// Returns the number of deleted rows; zero matches is not an error.
    pub fn delete_media(&self, media_id: Uuid) -> Result<usize, IndexError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM vector_entries WHERE media_id = ?1",
            params![media_id.to_string()],
        )?;
        Ok(deleted)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> Result<usize, IndexError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM vector_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorEntry> {
    let id: String = row.get(0)?;
    let media_id: String = row.get(1)?;
    let blob: Vec<u8> = row.get(3)?;
    Ok(VectorEntry {
        id: id.parse().unwrap_or_default(),
        document: row.get(2)?,
        embedding: blob_to_embedding(&blob),
        metadata: SegmentMetadata {
            media_id: media_id.parse().unwrap_or_default(),
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            confidence: row.get(6)?,
        },
    })
}

/// Encode an embedding as a little-endian f32 blob.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a little-endian f32 blob back into an embedding.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance in [0, 2]: 1 − cos(a, b).
///
/// A zero-norm vector (the empty-text fallback) has no direction; its
/// distance to anything is defined as 1.0, i.e. zero similarity.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
