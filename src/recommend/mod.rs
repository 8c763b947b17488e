//! Course recommendation over the embedding index
//!
//! Two read-only entry points: similarity search seeded by free text or by an
//! indexed course, and per-user recommendation from the centroid of the
//! user's enrolled courses.

mod service;

pub use service::RecommendationService;

use crate::catalog::CourseId;
use serde::{Deserialize, Serialize};

/// Results returned when the caller does not ask for a count
pub const DEFAULT_TOP_N: usize = 3;

pub(crate) const INDEX_NOT_READY: &str =
    "Embeddings are being initialized. Please try again in a moment.";
pub(crate) const NO_SIMILAR_COURSES: &str = "No similar courses found";
pub(crate) const NO_ENROLLMENTS: &str = "Enroll in courses to get personalized recommendations";
pub(crate) const NO_RECOMMENDATIONS: &str = "Unable to generate recommendations at this time";

/// Similarity search request
///
/// With `text`, the text is embedded and matched. Without it,
/// `exclude_course_id` doubles as the seed: its stored embedding is the
/// query and the course itself is left out of the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub exclude_course_id: Option<CourseId>,
    pub top_n: usize,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            exclude_course_id: None,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Courses similar to `course_id`, excluding it
    pub fn similar_to(course_id: CourseId) -> Self {
        Self {
            text: None,
            exclude_course_id: Some(course_id),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_exclude(mut self, course_id: CourseId) -> Self {
        self.exclude_course_id = Some(course_id);
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builders() {
        let query = SearchQuery::text("password safety").with_exclude(4).with_top_n(5);
        assert_eq!(query.text.as_deref(), Some("password safety"));
        assert_eq!(query.exclude_course_id, Some(4));
        assert_eq!(query.top_n, 5);

        let similar = SearchQuery::similar_to(9);
        assert_eq!(similar.text, None);
        assert_eq!(similar.exclude_course_id, Some(9));
        assert_eq!(similar.top_n, DEFAULT_TOP_N);
    }
}
