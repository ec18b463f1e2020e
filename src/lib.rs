//! Receipt parsing and per-user item identity for Israeli supermarket
//! receipts.
//!
//! The pipeline has three legs: extraction (model-first, deterministic
//! heuristics as fallback), identity resolution (alias lookup, then fuzzy
//! matching against personal and global catalogs), and a confirmation loop
//! that turns user decisions into aliases so the same raw string resolves
//! exactly next time.

pub mod confidence;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod ingest;
pub mod llm_extract;
pub mod matcher;
pub mod model;
pub mod pdf_extract;
pub mod review;
pub mod store;

pub use config::{Config, LlmBackend};
pub use error::{KabalaError, Result};
pub use heuristics::rules::RuleSet;
pub use ingest::{ParseOutcome, ParseSource};
pub use matcher::match_items;
pub use model::{ItemAlias, MatchedItem, ParsedItem, ParsedReceipt};
pub use review::{ReceiptReview, SaveSummary};
pub use store::SqliteStore;
