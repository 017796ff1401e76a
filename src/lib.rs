//! Knowledge Base - Curriculum & Progress Store Library
//!
//! A curriculum knowledge base service with:
//! - Subject/textbook/unit/lesson hierarchy management
//! - A shared character and phrase registry with lesson links
//! - Cumulative vocabulary coverage queries over lesson sequences
//! - Learner test session tracking with mastery aggregation
//! - Transactional bulk import for textbooks, lessons, and frequency data
//!
//! # Example
//!
//! ```ignore
//! use knowledge_base::store::Store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Store::open("./data/knowledge.db", 5000).await?;
//!     let subjects = store.list_subjects().await?;
//!     println!("{} subjects", subjects.len());
//!     Ok(())
//! }
//! ```

// Core modules (store must come before server since handlers depend on it)
pub mod types;
pub mod error;
pub mod store;
pub mod config;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use store::Store;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
