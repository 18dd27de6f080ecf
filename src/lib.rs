pub mod brief;
pub mod chunking;
pub mod config;
pub mod database;
pub mod document;
pub mod domain;
pub mod embeddings;
pub mod gemini;
pub mod index;
pub mod indexer;
pub mod profile;
pub mod retriever;
pub mod targets;
