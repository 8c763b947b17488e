use super::{
    SearchQuery, INDEX_NOT_READY, NO_ENROLLMENTS, NO_RECOMMENDATIONS, NO_SIMILAR_COURSES,
};
use crate::catalog::{CatalogReader, CourseId, CourseRecord, ProgressStore, UserId};
use crate::embedding::{centroid, rank, Embedding, EmbeddingProvider};
use crate::error::{Result, SkywiseError};
use crate::indexing::IndexingController;
use crate::storage::VectorStore;
use ahash::AHashSet;
use std::sync::Arc;

/// Completion percentage at which a course counts as finished
const COMPLETED_PROGRESS: f64 = 100.0;

/// Ranked ids resolved per catalog lookup
const RESOLVE_WINDOW: usize = 32;

/// Serves similarity search and per-user recommendations.
///
/// Never writes to the store; an empty index only schedules a background
/// sync on the controller.
pub struct RecommendationService {
    store: Arc<dyn VectorStore>,
    catalog: Arc<dyn CatalogReader>,
    progress: Arc<dyn ProgressStore>,
    provider: Arc<dyn EmbeddingProvider>,
    controller: Arc<IndexingController>,
    exclude_completed: bool,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        catalog: Arc<dyn CatalogReader>,
        progress: Arc<dyn ProgressStore>,
        provider: Arc<dyn EmbeddingProvider>,
        controller: Arc<IndexingController>,
    ) -> Self {
        Self {
            store,
            catalog,
            progress,
            provider,
            controller,
            exclude_completed: true,
        }
    }

    pub fn with_exclude_completed(mut self, exclude_completed: bool) -> Self {
        self.exclude_completed = exclude_completed;
        self
    }

    /// Courses most similar to the query text, or to the seed course
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<CourseRecord>> {
        validate_top_n(query.top_n)?;
        let seed = QuerySeed::from_query(query)?;

        self.ensure_index_ready()?;

        let query_vector = match seed {
            QuerySeed::Text(text) => self.provider.embed(text).await?,
            QuerySeed::Course(course_id) => self.seed_embedding(course_id)?,
        };

        let exclude: AHashSet<CourseId> = query.exclude_course_id.into_iter().collect();
        let candidates = self.store.read_all(&exclude)?;
        if candidates.is_empty() {
            return Err(SkywiseError::NotFound(NO_SIMILAR_COURSES.to_string()));
        }

        let ranked = rank(&query_vector, &candidates, candidates.len());
        tracing::debug!(
            "Ranked {} candidates: {:?}",
            candidates.len(),
            &ranked[..ranked.len().min(query.top_n)]
        );

        let ids: Vec<CourseId> = ranked.into_iter().map(|r| r.course_id).collect();
        self.collect_courses(&ids, query.top_n, |_| Ok(true))
    }

    /// Courses near the centroid of the user's enrolled courses, excluding
    /// those courses
    pub async fn recommend_for_user(
        &self,
        user_id: UserId,
        top_n: usize,
    ) -> Result<Vec<CourseRecord>> {
        validate_top_n(top_n)?;
        self.ensure_index_ready()?;

        let enrolled = self.progress.get_enrolled_course_ids(user_id)?;
        if enrolled.is_empty() {
            return Err(SkywiseError::NotFound(NO_ENROLLMENTS.to_string()));
        }

        let enrolled_records = self.store.read_by_ids(&enrolled)?;
        if enrolled_records.is_empty() {
            tracing::warn!(
                "None of user {}'s {} enrolled courses are indexed",
                user_id,
                enrolled.len()
            );
            return Err(SkywiseError::NotFound(NO_RECOMMENDATIONS.to_string()));
        }

        let interest = centroid(enrolled_records.iter().map(|r| r.embedding.as_slice()))
            .ok_or_else(|| SkywiseError::NotFound(NO_RECOMMENDATIONS.to_string()))?;

        let exclude: AHashSet<CourseId> = enrolled.iter().copied().collect();
        let candidates = self.store.read_all(&exclude)?;
        if candidates.is_empty() {
            return Err(SkywiseError::NotFound(NO_SIMILAR_COURSES.to_string()));
        }

        let ids: Vec<CourseId> = rank(&interest, &candidates, candidates.len())
            .into_iter()
            .map(|r| r.course_id)
            .collect();

        // Enrolled ids are already excluded above, so this only drops courses
        // the progress store reports as completed without an enrollment
        let exclude_completed = self.exclude_completed;
        self.collect_courses(&ids, top_n, |course| {
            Ok(!(exclude_completed && self.is_completed(user_id, course.id)?))
        })
    }

    fn ensure_index_ready(&self) -> Result<()> {
        // Any non-empty index serves, even one that drifted from the catalog
        if self.store.count()? > 0 {
            return Ok(());
        }

        if !self.controller.is_rebuilding() {
            tracing::info!("Embedding index is empty; scheduling a sync");
            self.controller.spawn_sync();
        }
        Err(SkywiseError::ServiceUnavailable(INDEX_NOT_READY.to_string()))
    }

    fn seed_embedding(&self, course_id: CourseId) -> Result<Embedding> {
        self.store
            .read_by_ids(&[course_id])?
            .into_iter()
            .next()
            .map(|record| record.embedding)
            .ok_or_else(|| SkywiseError::NotFound(NO_SIMILAR_COURSES.to_string()))
    }

    fn is_completed(&self, user_id: UserId, course_id: CourseId) -> Result<bool> {
        Ok(self
            .progress
            .get_completion(user_id, course_id)?
            .is_some_and(|progress| progress >= COMPLETED_PROGRESS))
    }

    /// Walk `ranked` in windows, resolving ids through the catalog, until
    /// `top_n` courses pass `keep`. Ids the catalog no longer knows are
    /// skipped, so a stale row never takes a slot.
    fn collect_courses<F>(
        &self,
        ranked: &[CourseId],
        top_n: usize,
        mut keep: F,
    ) -> Result<Vec<CourseRecord>>
    where
        F: FnMut(&CourseRecord) -> Result<bool>,
    {
        let mut picked = Vec::with_capacity(top_n.min(ranked.len()));
        for window in ranked.chunks(top_n.max(RESOLVE_WINDOW)) {
            for course in self.catalog.get_courses_by_ids(window)? {
                if picked.len() == top_n {
                    break;
                }
                if keep(&course)? {
                    picked.push(course);
                }
            }
            if picked.len() == top_n {
                break;
            }
        }

        if picked.is_empty() {
            return Err(SkywiseError::NotFound(NO_SIMILAR_COURSES.to_string()));
        }
        Ok(picked)
    }
}

/// Where the query vector comes from
enum QuerySeed<'a> {
    Text(&'a str),
    Course(CourseId),
}

impl<'a> QuerySeed<'a> {
    fn from_query(query: &'a SearchQuery) -> Result<Self> {
        match (&query.text, query.exclude_course_id) {
            (Some(text), _) if text.trim().is_empty() => Err(SkywiseError::InvalidQuery(
                "query text must not be blank".to_string(),
            )),
            (Some(text), _) => Ok(QuerySeed::Text(text)),
            (None, Some(course_id)) => Ok(QuerySeed::Course(course_id)),
            (None, None) => Err(SkywiseError::InvalidQuery(
                "either query text or a course id is required".to_string(),
            )),
        }
    }
}

fn validate_top_n(top_n: usize) -> Result<()> {
    if top_n == 0 {
        return Err(SkywiseError::InvalidQuery(
            "top_n must be at least 1".to_string(),
        ));
    }
    Ok(())
}
