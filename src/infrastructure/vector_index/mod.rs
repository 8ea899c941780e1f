pub mod chroma_backend;
pub mod memory_backend;

pub use chroma_backend::{ChromaBackend, ChromaConfig};
pub use memory_backend::InMemoryVectorBackend;
