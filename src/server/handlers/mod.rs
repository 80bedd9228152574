pub mod chat;
pub mod config;
pub mod health;
pub mod research;
pub mod sessions;
pub mod summarize;
pub mod ui;
