#![allow(dead_code)]

use async_trait::async_trait;
use rusqlite::params;
use skywise::app::App;
use skywise::catalog::{CourseId, CourseRecord, SqliteCatalog, UserId};
use skywise::config::Config;
use skywise::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use skywise::storage::{Database, SqliteVectorStore, VectorStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const MOCK_MODEL: &str = "mock-embedding";

/// Provider with fixed vectors per text and call accounting
pub struct MockProvider {
    vectors: Mutex<HashMap<String, Embedding>>,
    fallback: Embedding,
    delay: Duration,
    fail: AtomicBool,
    drop_last: AtomicBool,
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub batched_texts: Mutex<Vec<Vec<String>>>,
}

impl MockProvider {
    pub fn new(dimension: usize) -> Self {
        let mut fallback = vec![0.0; dimension];
        if let Some(first) = fallback.first_mut() {
            *first = 1.0;
        }
        Self {
            vectors: Mutex::new(HashMap::new()),
            fallback,
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
            drop_last: AtomicBool::new(false),
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batched_texts: Mutex::new(Vec::new()),
        }
    }

    /// Every call sleeps for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make `embed_batch` return one vector fewer than requested
    pub fn set_drop_last(&self, drop_last: bool) {
        self.drop_last.store(drop_last, Ordering::SeqCst);
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, text: &str) -> Embedding {
        self.vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Api("mock provider unavailable".to_string()));
        }
        Ok(self.lookup(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batched_texts.lock().unwrap().push(texts.to_vec());
        self.pause().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Api("mock provider unavailable".to_string()));
        }

        let mut vectors: Vec<Embedding> = texts.iter().map(|t| self.lookup(t)).collect();
        if self.drop_last.load(Ordering::SeqCst) {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.fallback.len()
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

/// A scratch database with catalog helpers
pub struct TestEnv {
    _temp: TempDir,
    pub db: Arc<Database>,
    pub store: Arc<SqliteVectorStore>,
    pub catalog: Arc<SqliteCatalog>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp.path().join("skywise.db"), 4).unwrap());
        Self {
            store: Arc::new(SqliteVectorStore::new(Arc::clone(&db))),
            catalog: Arc::new(SqliteCatalog::new(Arc::clone(&db))),
            db,
            _temp: temp,
        }
    }

    pub fn add_course(&self, id: CourseId, name: &str, description: &str) -> CourseRecord {
        self.insert_course(id, name, description, true)
    }

    pub fn add_private_course(&self, id: CourseId, name: &str, description: &str) -> CourseRecord {
        self.insert_course(id, name, description, false)
    }

    fn insert_course(
        &self,
        id: CourseId,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> CourseRecord {
        let conn = self.db.get_conn().unwrap();
        conn.execute(
            "INSERT INTO courses (id, name, description, is_public) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, description, is_public as i64],
        )
        .unwrap();
        CourseRecord::new(id, name, description)
    }

    pub fn enroll(&self, user_id: UserId, course_id: CourseId, progress: f64) {
        let conn = self.db.get_conn().unwrap();
        conn.execute(
            "INSERT INTO user_course_progress (user_id, course_id, progress) VALUES (?1, ?2, ?3)",
            params![user_id, course_id, progress],
        )
        .unwrap();
    }

    /// Add a public course and register its vector with `provider`
    pub fn add_embedded_course(
        &self,
        provider: &MockProvider,
        id: CourseId,
        name: &str,
        vector: Vec<f32>,
    ) -> CourseRecord {
        let course = self.add_course(id, name, &format!("About {}", name));
        provider.set_vector(&course.embed_text(), vector);
        course
    }

    pub fn app(&self, provider: Arc<MockProvider>) -> App {
        self.app_with_config(provider, &Config::default())
    }

    pub fn app_with_config(&self, provider: Arc<MockProvider>, config: &Config) -> App {
        let store: Arc<dyn VectorStore> = self.store.clone();
        App::from_parts(
            store,
            self.catalog.clone(),
            self.catalog.clone(),
            provider,
            config,
        )
    }
}

pub fn ids(courses: &[CourseRecord]) -> Vec<CourseId> {
    courses.iter().map(|c| c.id).collect()
}
