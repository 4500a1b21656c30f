//! # dog-blob: content stores for DogRS
//!
//! `dog-blob` holds the byte payloads behind content properties. Every store
//! addresses payloads by an opaque [`ContentId`] and speaks the same small
//! [`ContentStore`] contract:
//!
//! - `put(None, stream)` allocates a fresh id, `put(Some(id), stream)` overwrites in place
//! - `get(id)` returns a single-use [`Resource`] handle, or `None` when nothing is stored
//! - `delete(id)` removes the payload and retires the id; retired ids cannot be written again
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_blob::prelude::*;
//! use futures_util::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = MemoryStore::new();
//!
//! let put = store.put(None, bytes_stream("Hello, world!")).await?;
//! let resource = store.get(&put.id).await?.expect("payload stored");
//!
//! // Ranged read of "world"
//! let mut opened = resource.open(Some(ByteRange::new(7, Some(11)))).await?;
//! let chunk = opened.stream.next().await.unwrap()?;
//! assert_eq!(&chunk[..], b"world");
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - [`FilesystemStore`]: one file per id below a root directory
//! - [`S3CompatibleStore`]: AWS S3, RustFS, MinIO via `aws-sdk-s3`
//! - [`MemoryStore`]: in-process, for tests and demos

mod config;
mod error;
mod fs_store;
mod memory_store;
mod resource;
mod s3_store;
pub mod store;
mod types;

pub use config::{BlobConfig, S3Config};
pub use error::{BlobError, BlobResult};
pub use fs_store::FilesystemStore;
pub use memory_store::MemoryStore;
pub use resource::{OpenedResource, Resource, ResourceReader, ResolvedRange};
pub use s3_store::S3CompatibleStore;
pub use store::{ContentStore, PutResult};
pub use types::{bytes_stream, ByteRange, ByteStream, ContentId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        bytes_stream, BlobConfig, BlobError, BlobResult, ByteRange, ByteStream, ContentId,
        ContentStore, MemoryStore, Resource,
    };
}
