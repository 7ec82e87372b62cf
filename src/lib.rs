//! # repo-chat
//!
//! Chat with a source repository through retrieval-augmented generation.
//!
//! repo-chat walks a directory tree, splits every file into overlapping
//! header-tagged chunks, prices the embedding run before anything is sent,
//! indexes the chunks into a vector store, and then answers questions about
//! the code by retrieving the closest chunks for each query.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌──────────────┐
//! │ collect  │──▶│  chunk  │──▶│   cost   │──▶│    index     │
//! │ (walk)   │   │ (2000/  │   │ (tokens, │   │ embed+upsert │
//! └──────────┘   │  200)   │   │  price)  │   └──────┬───────┘
//!                └─────────┘   └──────────┘          │
//!                                                    ▼
//!                ┌──────────────┐            ┌──────────────┐
//!                │     chat     │◀──search───│ vector store │
//!                │ (generation) │            │ sqlite/supa. │
//!                └──────────────┘            └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! repo-chat init                 # create the local index database
//! repo-chat estimate ./my-repo   # print the token and price estimate
//! repo-chat ingest ./my-repo     # estimate, confirm, index, then chat
//! repo-chat chat                 # chat against an existing index
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`collect`] | Directory traversal with exclusions |
//! | [`chunk`] | Overlapping, header-tagged chunking |
//! | [`cost`] | Token counting and price estimation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`index`] | Batched embed-and-upsert |
//! | [`generation`] | Chat completion provider |
//! | [`chat`] | Interactive retrieval chat loop |
//! | [`pipeline`] | Estimate-then-commit ingest flow |
//! | [`progress`] | Ingest progress reporting |
//! | [`retry`] | Shared HTTP retry with backoff |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | SQLite schema |

pub mod chat;
pub mod chunk;
pub mod collect;
pub mod config;
pub mod cost;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod store;
