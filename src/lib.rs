/*!
 * bundle-relay - tag-driven routing of storage bundles between buckets
 *
 * For one object per invocation:
 * - Reads the object's tags and the configured route policy
 * - Skips names matching the transfer-exclusion patterns
 * - Moves CAT3 bundles to the Voltron bucket (source deleted afterwards)
 * - Copies other unprocessed bundles to the CAT2 bucket, AES-256-GCM
 *   encrypted unless the name marks them as already encrypted
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;

// Re-export commonly used types
pub use config::{LogLevel, PolicyFlag, RelayConfig, StoreConfig};
pub use core::{RoutingAction, TransferOrchestrator, TransferOutcome, TransferReport};
pub use error::{RelayError, Result};
pub use protocol::{ObjectRef, ObjectStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
