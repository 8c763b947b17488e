//! SkyWise - Course Recommendation Core
//!
//! Embeds the public course catalog into a persisted vector index, keeps that
//! index in step with the catalog, and ranks courses by cosine similarity for
//! free-text search, "similar courses" and per-user recommendations.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod recommend;
pub mod storage;

pub use error::{Result, SkywiseError, Status};
