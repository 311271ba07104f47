pub mod compose;
pub mod embedding;
pub mod format;
pub mod handlers;
pub mod indexer;
pub mod search;
pub mod vector_store;
