/*!
 * Storage protocol layer for bundle-relay
 *
 * Only S3 is spoken; `s3::ObjectStore` is the seam the core depends on.
 */

pub mod s3;

pub use s3::{ObjectRef, ObjectStore};
