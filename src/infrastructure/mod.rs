pub mod container;
pub mod database;
pub mod file_system;
pub mod vector_index;

pub use container::AppContainer;
pub use database::{DbPool, create_connection_pool};
pub use file_system::LocalBlobStorage;
pub use vector_index::{ChromaBackend, ChromaConfig, InMemoryVectorBackend};
