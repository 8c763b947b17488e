//! Storage layer for SkyWise
//!
//! SQLite access through a connection pool, scoped transactions, and the
//! persisted course embedding store

pub mod database;
pub mod vector_store;

pub use database::{Database, DbConn, DbPool, DbStats};
pub use vector_store::{
    decode_embedding, encode_embedding, CourseEmbeddingRecord, SqliteVectorStore, VectorStore,
    VectorStoreStats,
};
