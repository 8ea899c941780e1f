pub mod sqlite_document_repository;

pub use sqlite_document_repository::SqliteDocumentRepository;
