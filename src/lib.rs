//! # jute-sync
//!
//! Keeps a rendered result in step with a jute transformation definition and
//! the document it is applied to.
//!
//! ## Features
//!
//! - **Debounced sync**: edits to the definition or document are collapsed
//!   into one POST per burst, after a quiet window (300ms by default)
//! - **Stale-response suppression**: a slow reply never overwrites a result
//!   produced by a newer request
//! - **File binding**: definition and document can live in files; saving a
//!   file is an edit
//! - **Local preview**: evaluate path expressions against YAML or JSON
//!   without a server
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jute_sync::{Config, SyncController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let controller = SyncController::with_http(&config, "name: $ name.family", "name: []")?;
//!     let _listener = controller.start()?;
//!
//!     controller.document().set_value("name: [{family: Ryzhikov}]")?;
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     println!("{}", controller.result().get_value());
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod debounce;
pub mod error;
pub mod eval;
pub mod logging;
pub mod samples;
pub mod sync;
pub mod watcher;

// Re-export main types for library consumers
pub use buffer::{BufferChange, BufferId, EditorBuffer};
pub use config::{Config, OrderingPolicy};
pub use error::{FailureCategory, RetryPolicy, SyncFailure};
pub use eval::{evaluate, InputFormat, Rendered};
pub use sync::{HttpTransport, Outcome, SyncController, SyncRequest, SyncResponse, SyncStatus, SyncTransport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
