pub mod chains;
pub mod core;
pub mod history;
pub mod llm;
pub mod loaders;
pub mod prompt;
pub mod rag;
pub mod server;
pub mod state;
