//! Knowledge Base - Curriculum & Progress Store
//!
//! HTTP service over a SQLite store for curriculum content (subjects,
//! textbooks, units, lessons, characters, phrases) and learner test tracking.

use knowledge_base::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (INFO level by default, use RUST_LOG to adjust)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Run CLI
    cli::run().await
}
