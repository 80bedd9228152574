//! Prompt → model → parser pipelines behind each demo.

pub mod chat;
pub mod conversational;
pub mod retrieval;
pub mod summarize;

pub use chat::ChatChain;
pub use conversational::{ConversationalAnswer, ConversationalRagChain};
pub use retrieval::{RetrievalAnswer, RetrievalQaChain};
pub use summarize::{SummarizeChain, SummaryOutput};
