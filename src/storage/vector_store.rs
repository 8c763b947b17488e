//! Persisted course embeddings, one row per course

use super::Database;
use crate::catalog::CourseId;
use crate::embedding::Embedding;
use crate::error::{Result, SkywiseError};
use ahash::{AHashMap, AHashSet};
use rusqlite::{params, params_from_iter, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// SQLite's default bound-parameter limit is 999; stay well below it
const MAX_PARAMS_PER_QUERY: usize = 500;

/// One stored embedding and the text it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEmbeddingRecord {
    pub course_id: CourseId,
    /// Exactly the string that was embedded (`name + " " + description`)
    pub embed_text: String,
    pub embedding: Embedding,
    /// Model that produced `embedding`
    pub model: String,
}

/// Summary of what the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStoreStats {
    pub rows: usize,
    pub models: Vec<String>,
    pub dimensions: Vec<usize>,
}

/// Persistence contract for course embeddings
pub trait VectorStore: Send + Sync {
    /// Atomically discard every row and insert `records`.
    ///
    /// On failure the previous rows are left untouched.
    fn replace_all(&self, records: &[CourseEmbeddingRecord]) -> Result<()>;

    /// Append `records` in one transaction; fails without writing anything if
    /// any course id is already present.
    fn insert_many(&self, records: &[CourseEmbeddingRecord]) -> Result<()>;

    /// Number of stored rows
    fn count(&self) -> Result<usize>;

    /// Every `(course_id, embedding)` whose id is not in `exclude_ids`, in no
    /// particular order
    fn read_all(&self, exclude_ids: &AHashSet<CourseId>) -> Result<Vec<(CourseId, Embedding)>>;

    /// Stored records for `ids`, in the order of `ids`. Unknown ids are
    /// skipped and repeated ids appear once, at their first position.
    fn read_by_ids(&self, ids: &[CourseId]) -> Result<Vec<CourseEmbeddingRecord>>;

    fn stats(&self) -> Result<VectorStoreStats>;
}

/// [`VectorStore`] over the `course_embedding` table
pub struct SqliteVectorStore {
    db: Arc<Database>,
}

impl SqliteVectorStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn insert_records(tx: &Transaction<'_>, records: &[CourseEmbeddingRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut stmt = tx.prepare(
            "INSERT INTO course_embedding (course_id, embed_text, embedding, dimension, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for record in records {
            stmt.execute(params![
                record.course_id,
                record.embed_text,
                encode_embedding(&record.embedding),
                record.embedding.len() as i64,
                record.model,
                now
            ])?;
        }

        Ok(())
    }
}

impl VectorStore for SqliteVectorStore {
    fn replace_all(&self, records: &[CourseEmbeddingRecord]) -> Result<()> {
        self.db.transaction(|tx| {
            let removed = tx.execute("DELETE FROM course_embedding", [])?;
            Self::insert_records(tx, records)?;
            tracing::debug!(
                "Replacing {} embedding rows with {}",
                removed,
                records.len()
            );
            Ok(())
        })
    }

    fn insert_many(&self, records: &[CourseEmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.db.transaction(|tx| Self::insert_records(tx, records))
    }

    fn count(&self) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM course_embedding", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn read_all(&self, exclude_ids: &AHashSet<CourseId>) -> Result<Vec<(CourseId, Embedding)>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare("SELECT course_id, embedding FROM course_embedding")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, CourseId>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (course_id, blob) = row?;
            if exclude_ids.contains(&course_id) {
                continue;
            }
            candidates.push((course_id, decode_or_empty(course_id, &blob)));
        }

        Ok(candidates)
    }

    fn read_by_ids(&self, ids: &[CourseId]) -> Result<Vec<CourseEmbeddingRecord>> {
        let ordered = dedup_preserving_order(ids);
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.get_conn()?;
        let mut found: AHashMap<CourseId, CourseEmbeddingRecord> =
            AHashMap::with_capacity(ordered.len());

        for chunk in ordered.chunks(MAX_PARAMS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT course_id, embed_text, embedding, model FROM course_embedding
                 WHERE course_id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), record_from_row)?;
            for row in rows {
                let record = row?;
                found.insert(record.course_id, record);
            }
        }

        Ok(ordered
            .into_iter()
            .filter_map(|id| found.remove(&id))
            .collect())
    }

    fn stats(&self) -> Result<VectorStoreStats> {
        let conn = self.db.get_conn()?;

        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM course_embedding", [], |row| row.get(0))?;

        let mut stmt = conn.prepare("SELECT DISTINCT model FROM course_embedding ORDER BY model")?;
        let models = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt =
            conn.prepare("SELECT DISTINCT dimension FROM course_embedding ORDER BY dimension")?;
        let dimensions = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|d| d.map(|d| d as usize))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(VectorStoreStats {
            rows: rows as usize,
            models,
            dimensions,
        })
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CourseEmbeddingRecord> {
    let course_id: CourseId = row.get(0)?;
    let blob: Vec<u8> = row.get(2)?;
    Ok(CourseEmbeddingRecord {
        course_id,
        embed_text: row.get(1)?,
        embedding: decode_or_empty(course_id, &blob),
        model: row.get(3)?,
    })
}

pub(crate) fn dedup_preserving_order(ids: &[CourseId]) -> Vec<CourseId> {
    let mut seen = AHashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Little-endian f32 encoding used for the `embedding` column
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Inverse of [`encode_embedding`]
pub fn decode_embedding(blob: &[u8]) -> Result<Embedding> {
    if blob.len() % 4 != 0 {
        return Err(SkywiseError::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

// A corrupt row becomes an empty vector, which scores 0 against any query
fn decode_or_empty(course_id: CourseId, blob: &[u8]) -> Embedding {
    decode_embedding(blob).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable embedding for course {}: {}", course_id, e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_encoding() {
        let vector = vec![0.25, -1.5, 3.0];
        let blob = encode_embedding(&vector);
        assert_eq!(blob.len(), 12);
        assert_eq!(decode_embedding(&blob).unwrap(), vector);
    }

    #[test]
    fn test_truncated_blob() {
        assert!(decode_embedding(&[0, 0, 128]).is_err());
        assert!(decode_or_empty(1, &[0, 0, 128]).is_empty());
    }

    #[test]
    fn test_dedup_preserving_order() {
        assert_eq!(dedup_preserving_order(&[5, 2, 5, 9, 2]), vec![5, 2, 9]);
    }
}
