use super::{IndexHealth, IndexStatus, RebuildOutcome, RebuildReport, SyncOutcome};
use crate::catalog::{CatalogReader, CourseId, CourseRecord};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::error::{Result, SkywiseError};
use crate::storage::{CourseEmbeddingRecord, VectorStore};
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Owns every write to the vector store
pub struct IndexingController {
    store: Arc<dyn VectorStore>,
    catalog: Arc<dyn CatalogReader>,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    writing: AtomicBool,
    status_tx: watch::Sender<IndexStatus>,
    last_rebuild: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

/// Result of one attempt to take the writer flag and rebuild
enum Attempt {
    Rebuilt(RebuildReport),
    /// The index was found in sync once the flag was held
    InSync,
    /// Another writer held the flag
    Busy,
}

/// Holds the writer flag; releases it on drop, including on error and panic
struct WriteGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> WriteGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl IndexingController {
    pub fn new(
        store: Arc<dyn VectorStore>,
        catalog: Arc<dyn CatalogReader>,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        let (status_tx, _) = watch::channel(IndexStatus::Unsynced);
        Self {
            store,
            catalog,
            provider,
            batch_size: batch_size.max(1),
            writing: AtomicBool::new(false),
            status_tx,
            last_rebuild: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// True while a rebuild or append holds the index
    pub fn is_rebuilding(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    /// Live state, computed from the store and catalog
    pub fn status(&self) -> Result<IndexStatus> {
        if self.is_rebuilding() {
            return Ok(IndexStatus::Rebuilding);
        }
        let indexed = self.store.count()?;
        let catalog_size = self.catalog.catalog_size()?;
        Ok(IndexStatus::classify(indexed, catalog_size))
    }

    /// Receiver for the last published state
    pub fn subscribe(&self) -> watch::Receiver<IndexStatus> {
        self.status_tx.subscribe()
    }

    pub fn health(&self) -> Result<IndexHealth> {
        let indexed = self.store.count()?;
        let catalog_size = self.catalog.catalog_size()?;
        let status = if self.is_rebuilding() {
            IndexStatus::Rebuilding
        } else {
            IndexStatus::classify(indexed, catalog_size)
        };

        Ok(IndexHealth {
            status,
            indexed,
            catalog_size,
            last_rebuild: *lock(&self.last_rebuild),
            last_error: lock(&self.last_error).clone(),
        })
    }

    /// Rebuild when the index is empty or its size differs from the catalog
    pub async fn ensure_synced(&self) -> Result<SyncOutcome> {
        if self.is_rebuilding() {
            return Ok(SyncOutcome::InProgress);
        }

        let catalog_size = self.catalog.catalog_size()?;
        if catalog_size == 0 {
            tracing::info!("Catalog has no public courses; nothing to index");
            self.publish(IndexStatus::Unsynced);
            return Ok(SyncOutcome::NothingToIndex);
        }

        let indexed = self.store.count()?;
        if indexed == catalog_size {
            tracing::debug!("Index in sync ({} courses)", indexed);
            self.publish(IndexStatus::Synced);
            return Ok(SyncOutcome::AlreadySynced);
        }

        tracing::info!(
            "Index out of sync ({} embedded, {} in catalog); rebuilding",
            indexed,
            catalog_size
        );

        match self.rebuild(true).await? {
            Attempt::Rebuilt(report) => Ok(SyncOutcome::Rebuilt(report)),
            Attempt::InSync => Ok(SyncOutcome::AlreadySynced),
            Attempt::Busy => Ok(SyncOutcome::InProgress),
        }
    }

    /// Re-embed the whole public catalog and atomically replace the index.
    ///
    /// On failure the previous index is kept and the error is recorded in
    /// [`IndexHealth::last_error`].
    pub async fn rebuild_all(&self) -> Result<RebuildOutcome> {
        match self.rebuild(false).await? {
            Attempt::Rebuilt(report) => Ok(RebuildOutcome::Completed(report)),
            Attempt::InSync | Attempt::Busy => Ok(RebuildOutcome::AlreadyRunning),
        }
    }

    // With `only_if_stale`, the counts are compared again once the writer
    // flag is held, since another writer may have finished in between.
    async fn rebuild(&self, only_if_stale: bool) -> Result<Attempt> {
        let Some(guard) = WriteGuard::acquire(&self.writing) else {
            tracing::debug!("Rebuild already in progress; skipping");
            return Ok(Attempt::Busy);
        };

        if only_if_stale && !self.is_stale()? {
            drop(guard);
            tracing::debug!("Index caught up before rebuild started");
            self.publish(IndexStatus::Synced);
            return Ok(Attempt::InSync);
        }

        self.publish(IndexStatus::Rebuilding);
        let result = self.rebuild_locked().await;
        drop(guard);

        match result {
            Ok(report) => {
                tracing::info!(
                    "Indexed {} courses in {} batches ({} ms)",
                    report.courses,
                    report.batches,
                    report.duration_ms
                );
                *lock(&self.last_rebuild) = Some(Utc::now());
                *lock(&self.last_error) = None;
                self.refresh_status();
                Ok(Attempt::Rebuilt(report))
            }
            Err(e) => {
                tracing::error!("Index rebuild failed, keeping previous index: {}", e);
                self.record_error(&e);
                self.publish(IndexStatus::Unsynced);
                Err(e)
            }
        }
    }

    /// Embed and append public courses among `course_ids` that are not indexed
    /// yet. Returns the number of rows added; 0 while a rebuild is running.
    pub async fn embed_subset(&self, course_ids: &[CourseId]) -> Result<usize> {
        let Some(guard) = WriteGuard::acquire(&self.writing) else {
            tracing::info!("Rebuild in progress; skipping incremental embed");
            return Ok(0);
        };

        let result = self.append_locked(course_ids).await;
        drop(guard);

        match result {
            Ok(added) => {
                if added > 0 {
                    tracing::info!("Appended {} course embeddings", added);
                    self.refresh_status();
                }
                Ok(added)
            }
            Err(e) => {
                tracing::error!("Incremental embed failed: {}", e);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Run [`ensure_synced`](Self::ensure_synced) on a background task
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            match controller.ensure_synced().await {
                Ok(outcome) => tracing::debug!("Background sync finished: {:?}", outcome),
                Err(e) => {
                    tracing::error!("Background index sync failed: {}", e);
                    controller.record_error(&e);
                }
            }
        })
    }

    /// Run [`rebuild_all`](Self::rebuild_all) on a background task
    pub fn spawn_rebuild(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            match controller.rebuild_all().await {
                Ok(outcome) => tracing::debug!("Background rebuild finished: {:?}", outcome),
                Err(e) => {
                    tracing::error!("Background index rebuild failed: {}", e);
                    controller.record_error(&e);
                }
            }
        })
    }

    fn is_stale(&self) -> Result<bool> {
        let indexed = self.store.count()?;
        let catalog_size = self.catalog.catalog_size()?;
        Ok(IndexStatus::classify(indexed, catalog_size) != IndexStatus::Synced)
    }

    async fn rebuild_locked(&self) -> Result<RebuildReport> {
        let started = Instant::now();
        let courses = self.catalog.get_public_courses()?;
        let (records, batches) = self.embed_courses(&courses).await?;

        self.store.replace_all(&records)?;

        Ok(RebuildReport {
            courses: records.len(),
            batches,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn append_locked(&self, course_ids: &[CourseId]) -> Result<usize> {
        let requested: AHashSet<CourseId> = course_ids.iter().copied().collect();
        if requested.is_empty() {
            return Ok(0);
        }

        let indexed: AHashSet<CourseId> = self
            .store
            .read_by_ids(course_ids)?
            .into_iter()
            .map(|record| record.course_id)
            .collect();

        let pending: Vec<CourseRecord> = self
            .catalog
            .get_public_courses()?
            .into_iter()
            .filter(|course| requested.contains(&course.id) && !indexed.contains(&course.id))
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let (records, _) = self.embed_courses(&pending).await?;
        self.store.insert_many(&records)?;
        Ok(records.len())
    }

    /// Embed `courses` in provider batches, keeping input order
    async fn embed_courses(
        &self,
        courses: &[CourseRecord],
    ) -> Result<(Vec<CourseEmbeddingRecord>, usize)> {
        let model = self.provider.model_name().to_string();
        let mut records = Vec::with_capacity(courses.len());
        let mut batches = 0;

        for chunk in courses.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(CourseRecord::embed_text).collect();
            let vectors = self.provider.embed_batch(&texts).await?;
            batches += 1;

            if vectors.len() != texts.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "provider returned {} embeddings for {} courses",
                    vectors.len(),
                    texts.len()
                ))
                .into());
            }

            for ((course, embed_text), embedding) in chunk.iter().zip(texts).zip(vectors) {
                records.push(CourseEmbeddingRecord {
                    course_id: course.id,
                    embed_text,
                    embedding,
                    model: model.clone(),
                });
            }

            tracing::debug!("Embedded batch {} ({} courses)", batches, chunk.len());
        }

        Ok((records, batches))
    }

    fn publish(&self, status: IndexStatus) {
        self.status_tx.send_replace(status);
    }

    fn refresh_status(&self) {
        match self.status() {
            Ok(status) => self.publish(status),
            Err(e) => tracing::warn!("Could not refresh index status: {}", e),
        }
    }

    fn record_error(&self, error: &SkywiseError) {
        *lock(&self.last_error) = Some(error.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
