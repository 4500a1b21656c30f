//! # dog-content: content properties for DogRS entities
//!
//! A *content property* is a named field on an entity whose value is a small
//! JSON object carrying a content id (and usually a mime type) that points at
//! a payload held in a [`dog_blob::ContentStore`]. This crate binds the two:
//!
//! - [`EntitySchema`] declares which fields are content properties and their shape
//! - [`StoreRegistry`] maps each content-bearing type to the store for its payloads
//! - [`ContentBinder`] reads, writes and deletes payloads and keeps the entity in step
//!
//! ```rust
//! use std::sync::Arc;
//! use dog_blob::{bytes_stream, MemoryStore};
//! use dog_content::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> ContentResult<()> {
//! let schema = EntitySchema::builder("documents")
//!     .property("attachment", DeclaredType::value("File"))
//!     .build()?;
//! let repository = Arc::new(MemoryRepository::new().with_collection("documents", schema));
//! repository.insert("documents", json!({"id": "42", "attachment": null})).unwrap();
//!
//! let registry = StoreRegistry::builder()
//!     .register(ContentTypeDescriptor::standard("File"), MemoryStore::new())
//!     .build()?;
//! let binder = ContentBinder::new(repository, Arc::new(registry));
//!
//! let bound = binder
//!     .write("documents", "42", "attachment", Some("text/plain"), bytes_stream("hello"))
//!     .await?;
//! let read = binder.read("documents", "42", "attachment").await?;
//! assert_eq!(read.content_id, bound.content_id);
//! assert_eq!(read.mime_type.as_deref(), Some("text/plain"));
//! # Ok(())
//! # }
//! ```

mod binder;
pub mod config;
mod error;
mod locks;
mod registry;
mod repository;
pub mod schema;

pub use binder::{BoundContent, ContentBinder, ContentRead};
pub use config::{BinderConfig, ContentConfig, DeletePolicy};
pub use error::{ContentError, ContentResult, ErrorKind, UnsupportedKind};
pub use registry::{ContentFactory, ContentTypeBuilder, ContentTypeDescriptor, StoreEntry, StoreRegistry, StoreRegistryBuilder};
pub use repository::{EntityRepository, MemoryRepository};
pub use schema::{
    runtime_type, ContentTypeName, DeclaredType, EntitySchema, EntitySchemaBuilder, PropertyRef, PropertyShape, Slot,
    TYPE_TAG,
};
