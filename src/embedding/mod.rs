/// Course embeddings
///
/// Text-to-vector providers and the similarity math used to rank courses.
/// Architecture:
/// - EmbeddingProvider trait for abstraction over backends
/// - OpenAIProvider for hosted embedding (text-embedding-3-small, 1536-dim)
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - Exact cosine ranking over the full candidate set (no ANN index)
mod openai;
mod provider;
pub mod similarity;

pub use openai::OpenAIProvider;
pub use provider::{provider_from_config, EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use similarity::{centroid, cosine_similarity, rank, rank_ids, SimilarityResult};

/// A dense vector embedding
pub type Embedding = Vec<f32>;

/// Dimension of text-embedding-3-small
pub const DEFAULT_DIMENSION: usize = 1536;

/// Default hosted embedding model
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
