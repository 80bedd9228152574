//! RAG (Retrieval-Augmented Generation) building blocks.
//!
//! - `document`: PDF and directory loaders
//! - `splitter`: fixed-size sliding-window chunking
//! - `index`: cosine-similarity vector index
//! - `store`: scope-keyed indexes behind the `RagStore` trait
//! - `ingest`: split, embed and store in one step

pub mod document;
pub mod index;
pub mod ingest;
pub mod splitter;
pub mod store;

pub use document::Document;
pub use index::{ScoredChunk, VectorIndex};
pub use ingest::{index_documents, IndexMode, IndexReport};
pub use splitter::{TextChunk, TextSplitter};
pub use store::{InMemoryRagStore, RagStore, RESEARCH_SCOPE};
