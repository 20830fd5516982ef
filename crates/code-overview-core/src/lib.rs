//! # Code Overview Core
//!
//! I/O-free logic for turning source files into searchable documentation
//! records ("overviews"): the overview entity and its identity rule, the
//! metadata filter builder, text windowing, the chunk/map/reduce summarizer,
//! structured extraction, the sequential procedure executor, ingestion, and
//! retrieval.
//!
//! External services are reached only through three traits:
//! [`store::VectorStore`], [`embedding::Embedder`], and
//! [`llm::LanguageModel`]. The crate ships an in-memory store and a hashing
//! embedder; network and database adapters live in the `code-overview` app
//! crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod filter;
pub mod ingest;
pub mod llm;
pub mod overview;
pub mod procedure;
pub mod search;
pub mod store;
pub mod summarize;

pub use error::{OverviewError, Result};
pub use filter::{build_filter, Filter, FilterOptions};
pub use overview::{ContentType, DocumentRecord, Overview};
pub use procedure::{Procedure, ProcedureContext, ProcedureError, Step};
pub use store::{StoredDocument, VectorStore};
