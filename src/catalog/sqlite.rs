use super::{CatalogReader, CourseId, CourseRecord, ProgressStore, UserId};
use crate::error::Result;
use crate::storage::vector_store::dedup_preserving_order;
use crate::storage::Database;
use ahash::AHashMap;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::sync::Arc;

const MAX_PARAMS_PER_QUERY: usize = 500;

/// Catalog and progress reader over the shared SQLite database
pub struct SqliteCatalog {
    db: Arc<Database>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<CourseRecord> {
    Ok(CourseRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        course_type: row.get(3)?,
    })
}

impl CatalogReader for SqliteCatalog {
    fn get_public_courses(&self) -> Result<Vec<CourseRecord>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, course_type FROM courses
             WHERE is_public = 1 ORDER BY id",
        )?;
        let courses = stmt
            .query_map([], course_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    fn get_courses_by_ids(&self, ids: &[CourseId]) -> Result<Vec<CourseRecord>> {
        let ordered = dedup_preserving_order(ids);
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.get_conn()?;
        let mut found: AHashMap<CourseId, CourseRecord> = AHashMap::with_capacity(ordered.len());

        for chunk in ordered.chunks(MAX_PARAMS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT id, name, description, course_type FROM courses WHERE id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), course_from_row)?;
            for row in rows {
                let course = row?;
                found.insert(course.id, course);
            }
        }

        // IN (...) returns rows in primary-key order; restore the caller's ranking
        Ok(ordered
            .into_iter()
            .filter_map(|id| found.remove(&id))
            .collect())
    }

    fn catalog_size(&self) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM courses WHERE is_public = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl ProgressStore for SqliteCatalog {
    fn get_enrolled_course_ids(&self, user_id: UserId) -> Result<Vec<CourseId>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT course_id FROM user_course_progress WHERE user_id = ?1 ORDER BY course_id",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, CourseId>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn get_completion(&self, user_id: UserId, course_id: CourseId) -> Result<Option<f64>> {
        let conn = self.db.get_conn()?;
        let progress = conn
            .query_row(
                "SELECT progress FROM user_course_progress WHERE user_id = ?1 AND course_id = ?2",
                params![user_id, course_id],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(progress)
    }
}
