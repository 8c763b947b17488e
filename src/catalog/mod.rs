//! Course catalog and learner progress, as read by the recommendation core
//!
//! The catalog and progress tables are owned by the CRUD layer; this module
//! only reads them.

mod sqlite;

pub use sqlite::SqliteCatalog;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Course primary key
pub type CourseId = i64;

/// User primary key
pub type UserId = i64;

/// A course as exposed by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_type: Option<String>,
}

impl CourseRecord {
    pub fn new(id: CourseId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            course_type: None,
        }
    }

    /// The text embedded for this course
    pub fn embed_text(&self) -> String {
        format!("{} {}", self.name, self.description)
    }
}

/// Read-only view of the course catalog
pub trait CatalogReader: Send + Sync {
    /// Every publicly listed course
    fn get_public_courses(&self) -> Result<Vec<CourseRecord>>;

    /// Courses for `ids`, in the order of `ids`. Unknown ids are skipped and
    /// repeated ids appear once, at their first position.
    fn get_courses_by_ids(&self, ids: &[CourseId]) -> Result<Vec<CourseRecord>>;

    /// Number of publicly listed courses
    fn catalog_size(&self) -> Result<usize> {
        Ok(self.get_public_courses()?.len())
    }
}

/// Read-only view of learner enrollment and progress
pub trait ProgressStore: Send + Sync {
    fn get_enrolled_course_ids(&self, user_id: UserId) -> Result<Vec<CourseId>>;

    /// Completion percentage (0-100), or `None` when the user is not enrolled
    fn get_completion(&self, user_id: UserId, course_id: CourseId) -> Result<Option<f64>>;
}
