//! Object store access for the relay
//!
//! The orchestrator talks to storage only through [`ObjectStore`], which
//! has two implementations:
//!
//! - [`S3Client`]: AWS S3 and S3-compatible services via `aws-sdk-s3`
//! - [`MemoryStore`]: an in-process store with failure injection
//!
//! # Example
//!
//! ```no_run
//! use bundle_relay::config::StoreConfig;
//! use bundle_relay::protocol::s3::{ObjectRef, ObjectStore, S3Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = S3Client::new(&StoreConfig::default()).await?;
//!     let tags = client
//!         .get_tags(&ObjectRef::new("imaging-bundles", "CAT3_BUNDLE/scan.zip"))
//!         .await?;
//!     println!("{:?}", tags.describe());
//!     Ok(())
//! }
//! ```

mod client;
mod error;
pub mod memory;
mod operations;
mod types;


pub use client::S3Client;
pub use error::{S3Error, S3Result};
pub use memory::{MemoryStore, StoreOp};
pub use operations::{read_body, ObjectBody, ObjectStore};
pub use types::{ObjectMetadata, ObjectRef};
