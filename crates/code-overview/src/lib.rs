//! # Code Overview
//!
//! **Documentation overviews and filtered semantic search for source trees.**
//!
//! Code Overview asks a language model to describe the classes, interfaces
//! and functions of each source file as [`Overview`] records, stores them
//! under stable identities in a vector store, and answers semantic queries
//! narrowed by project, type, name, namespace and references. It also keeps
//! project-level markdown documents (overview, coding rules, developer
//! guide) in sync with a tree through chunk/map/reduce summarization.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────────────┐
//! │  Files   │──▶│   Extract     │──▶│ Procedure          │
//! │ walkdir  │   │ (LLM, JSON)   │   │ [UpsertOverviews]  │
//! └────┬─────┘   └───────────────┘   └─────────┬──────────┘
//!      │                                       ▼
//!      │         ┌───────────────┐   ┌────────────────────┐
//!      └────────▶│  Summarize    │   │ VectorStore        │
//!                │ map / reduce  │   │ SQLite or memory   │
//!                └──────┬────────┘   └─────────┬──────────┘
//!                       ▼                      ▼
//!                 overview.md            ovw search
//! ```
//!
//! The domain types and the pipeline live in `code-overview-core`; this
//! crate supplies the adapters (OpenAI, SQLite, filesystem), configuration
//! and the `ovw` commands.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Idempotent schema setup |
//! | [`sqlite_store`] | SQLite [`VectorStore`] with content-hash re-embedding |
//! | [`store`] | Backend selection |
//! | [`openai`] | Shared OpenAI HTTP client with retry and backoff |
//! | [`embedding`] | Embedding providers: disabled, OpenAI, hash |
//! | [`llm`] | Chat model providers: disabled, OpenAI |
//! | [`files`] | Glob-filtered file discovery |
//! | [`index`] | `ovw index` and `ovw clear` |
//! | [`search`] | `ovw search` |
//! | [`summarize`] | `ovw summarize` |
//! | [`overview`] | `ovw overview`: project document generation |
//!
//! ## Configuration
//!
//! Configured via a TOML file (default: `config/overview.toml`). See
//! [`config`] for all options and [`config::load_config`] for validation
//! rules.

pub mod config;
pub mod db;
pub mod embedding;
pub mod files;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod openai;
pub mod overview;
pub mod search;
pub mod sqlite_store;
pub mod store;
pub mod summarize;

pub use code_overview_core::overview::Overview;
pub use code_overview_core::store::VectorStore;
pub use code_overview_core::{OverviewError, Result};
