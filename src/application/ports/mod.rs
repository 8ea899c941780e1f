pub mod blob_storage;
pub mod vector_backend;

pub use blob_storage::BlobStorage;
pub use vector_backend::VectorBackend;
