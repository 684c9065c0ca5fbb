//! azblob-adapter: a small HTTP front end for one Azure Blob Storage container.
//!
//! The `/azblob` endpoint lists every blob in the container (GET), uploads a
//! fixed test payload as a block blob under a fresh name (POST) and deletes a
//! blob together with its snapshots (DELETE `?filename=`).
//!
//! # Example
//!
//! ```no_run
//! use azblob_adapter::{AdapterServer, Args, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_args(Args::default()).unwrap();
//!     AdapterServer::new(config).run().await.unwrap();
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod server;
pub mod session;
pub mod storage;
pub mod xml;

// Re-exports for convenience
pub use config::{Args, Config, ConfigError, UploadOptions, DEFAULT_PORT};
pub use error::{AdapterError, AdapterResult, ErrorCode, StorageError};
pub use server::AdapterServer;
pub use session::ClientSession;
pub use storage::{
    AzureConnector, BlobStore, ContainerClient, MemoryBlobStore, MemoryConnector, StoreConnector,
};
