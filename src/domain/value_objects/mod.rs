pub mod chunk_id;
pub mod chunk_metadata;
pub mod content_hash;
pub mod document_status;

pub use chunk_id::{ChunkCodecError, ChunkId, decode_chunk_id, encode_chunk_id};
pub use chunk_metadata::ChunkMetadata;
pub use content_hash::ContentHash;
pub use document_status::DocumentStatus;
