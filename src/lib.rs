//! # repo-digest
//!
//! Turns a local directory or a remote git repository (optionally pinned to a branch,
//! commit or subpath) into one bounded text digest: a summary, a directory tree and the
//! concatenated file contents.
//!
//! ```no_run
//! # async fn demo() -> Result<(), repo_digest::IngestError> {
//! use repo_digest::{HttpProbe, Ingestor, Settings};
//!
//! let settings = Settings::from_env();
//! let probe = HttpProbe::new(&settings);
//! let result = Ingestor::new(&settings, &probe)
//!     .ingest_source("https://github.com/octo/widgets/tree/main/src")
//!     .await?;
//! println!("{}", result.full_text());
//! # Ok(())
//! # }
//! ```
//!
//! The crate emits `tracing` events but never installs a subscriber.

pub mod config;
pub mod contract;
pub mod digest;
pub mod download;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod load_config;
pub mod manifest;
pub mod node;
pub mod probe;
pub mod query;
pub mod redact;
pub mod traversal;
pub mod upload;

pub use config::{Limits, PublishSettings, Settings};
pub use contract::{CloneConfig, PublishOutcome, Publisher, RepositoryProbe};
pub use error::{AcquireError, Diagnostic, DiagnosticKind, IngestError, PublishError};
pub use ingest::{IngestionResult, Ingestor};
pub use probe::HttpProbe;
pub use query::{IngestionQuery, QueryKind};
pub use upload::S3Publisher;
