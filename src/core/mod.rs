/*!
 * Core relay logic: pattern filtering, tag inspection, routing, encryption
 * and transfer orchestration
 */

pub mod encryption;
pub mod filter;
pub mod routing;
pub mod tags;
pub mod transfer;

pub use encryption::{AesGcmEncryptor, EncryptionStage, PayloadEncryptor};
pub use filter::PatternSet;
pub use routing::{decide, RoutingAction};
pub use tags::{tag_exists, Tag, TagSet};
pub use transfer::{CleanupStatus, TransferOrchestrator, TransferOutcome, TransferReport};
