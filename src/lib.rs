//! # Knowledge Forge
//!
//! Semantic knowledge retrieval (RAG) for a small-business assistant.
//!
//! Notes and documents are embedded once at ingestion and stored alongside
//! their vectors. At query time the query is embedded with the same model,
//! scored against every stored vector with cosine similarity, filtered by a
//! relevance threshold and cut to the top K, and the surviving snippets are
//! handed to the downstream LLM prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Notes/Files │──▶│  Ingest     │──▶│   SQLite     │
//! │             │   │ Extract+Emb │   │ knowledge+vec│
//! └─────────────┘   └──────┬──────┘   └──────┬───────┘
//!                          │                 │ list_items()
//!                          ▼                 ▼
//!                   ┌─────────────┐   ┌──────────────┐
//!                   │  Embedding  │◀──│  Retriever   │
//!                   │  (Ollama)   │   │ cosine/top-K │
//!                   └─────────────┘   └──────┬───────┘
//!                                  ┌─────────┴────────┐
//!                                  ▼                  ▼
//!                            ┌──────────┐       ┌──────────┐
//!                            │   CLI    │       │   HTTP   │
//!                            │ (forge)  │       │  (axum)  │
//!                            └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! forge init
//! forge add --title "Pricing policy" "Hourly rate is 40, materials billed at cost."
//! forge ingest ./manuals/warranty.pdf
//! forge retrieve "how much do we charge per hour?"
//! forge serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Embedding and retrieval error types |
//! | [`embedding`] | Embedding provider abstraction and vector helpers |
//! | [`retrieve`] | Cosine ranking, thresholding and top-K selection |
//! | [`store`] | Knowledge store trait, SQLite and in-memory backends |
//! | [`ingest`] | Note and file ingestion |
//! | [`extract`] | Text extraction from files |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod store;
