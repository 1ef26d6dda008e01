//! Gmail Thread Labeler
//!
//! Examines a bounded batch of recent Gmail threads and labels them from an
//! approved-contacts table and a list of body keywords.
//!
//! # Overview
//!
//! - **Extraction**: participant addresses from From/To/Cc/Delivered-To headers
//! - **Approval**: CSV table mapping approved addresses to an optional category
//! - **Classification**: `Cleared`, `Cleared + <category>`, category and keyword labels
//! - **Label Management**: name-to-id resolution with create-on-miss and caching
//! - **Orchestration**: sequential run with bounded retries and per-thread isolation
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_labeler::{auth, cli, config::Config};
//! use gmail_labeler::client::{GmailClient, ProductionGmailClient};
//! use gmail_labeler::label_manager::LabelResolver;
//! use gmail_labeler::labeler::{LabelerOptions, ThreadLabeler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let (approval, keywords) = cli::load_sources(&config).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".gmail-labeler/token.json".as_ref(),
//!         false,
//!     )
//!     .await?;
//!     let client: Arc<dyn GmailClient> = Arc::new(ProductionGmailClient::new(hub));
//!
//!     let mut labeler = ThreadLabeler::new(
//!         Arc::clone(&client),
//!         LabelResolver::new(client),
//!         approval,
//!         keywords,
//!         LabelerOptions::from(&config),
//!     );
//!     let summary = labeler.run(&CancellationToken::new()).await?;
//!     println!("{}", summary);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`approval`] - Approved-contacts table and CSV loading
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`classifier`] - Label selection policy
//! - [`cli`] - Command-line interface and run wiring
//! - [`client`] - Gmail API client trait and production implementation
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`extractor`] - Address extraction from message headers
//! - [`keywords`] - Body keyword list
//! - [`label_manager`] - Label name resolution and creation
//! - [`labeler`] - Thread labeling orchestration and run summary
//! - [`models`] - Core data structures
//! - [`retry`] - Bounded retry and request pacing

pub mod approval;
pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod keywords;
pub mod label_manager;
pub mod labeler;
pub mod models;
pub mod retry;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

// Core data models
pub use models::{Address, Header, LabelInfo, Message, ThreadRef};

// Inputs
pub use approval::ApprovalTable;
pub use keywords::KeywordList;

// Classification
pub use classifier::{ClearedLabel, LabelNames, LabelPlan, ThreadClassifier};
pub use extractor::{extract_addresses, ThreadAddresses};

// Config types
pub use config::{Config, ExecutionConfig, LabelConfig, RetryConfig, ScanConfig, SourcesConfig};

// Client traits
pub use client::{GmailClient, ProductionGmailClient};

// Labeling
pub use label_manager::LabelResolver;
pub use labeler::{LabelerOptions, RunSummary, ThreadLabeler, ThreadOutcome};
pub use retry::RetryPolicy;

// CLI types (for binary usage)
pub use cli::{Cli, Commands, ProgressReporter, RunOverrides};
