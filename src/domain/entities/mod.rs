pub mod document;
pub mod document_chunk;
pub mod search_result;

pub use document::{Document, NewDocument};
pub use document_chunk::DocumentChunk;
pub use search_result::SearchResult;
