//! Vector indexing: embedding generation and the segment vector store.

pub mod indexer;
pub mod vector_index;

pub use indexer::{EmbeddingIndexer, IndexReport};
pub use vector_index::{cosine_distance, IndexError, VectorIndex};
