//! # Content binder
//!
//! Orchestrates Read, Write and Delete of a content property: load the entity,
//! resolve the property, find the store for the content-bearing type, call the
//! store, then persist the entity.
//!
//! Everything up to the store call works on a private copy of the entity, so
//! an early failure changes nothing. A failure after the store call is
//! reported as [`ContentError::PartialFailure`].

use std::sync::Arc;

use dog_blob::{ByteStream, ContentId, Resource};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use crate::locks::KeyedLocks;
use crate::{
    runtime_type, BinderConfig, ContentError, ContentResult, ContentTypeName, DeletePolicy, EntityRepository,
    EntitySchema, PropertyRef, PropertyShape, Slot, StoreEntry, StoreRegistry, TYPE_TAG,
};

/// Outcome of a Read: an unopened resource handle plus the value's mime type.
#[derive(Debug)]
pub struct ContentRead {
    pub content_id: ContentId,
    pub mime_type: Option<String>,
    pub resource: Resource,
}

/// Outcome of a Write: the content-bearing value as saved on the entity.
#[derive(Debug, Clone)]
pub struct BoundContent {
    pub value: Value,
    pub content_id: ContentId,
    pub size_bytes: u64,
    pub etag: Option<String>,
}

pub struct ContentBinder {
    repository: Arc<dyn EntityRepository>,
    registry: Arc<StoreRegistry>,
    config: BinderConfig,
    locks: KeyedLocks,
}

impl ContentBinder {
    pub fn new(repository: Arc<dyn EntityRepository>, registry: Arc<StoreRegistry>) -> Self {
        Self::with_config(repository, registry, BinderConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn EntityRepository>,
        registry: Arc<StoreRegistry>,
        config: BinderConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            config,
            locks: KeyedLocks::default(),
        }
    }

    /// Resolve the stored payload of a single-valued property.
    #[instrument(skip(self))]
    pub async fn read(&self, collection: &str, id: &str, property: &str) -> ContentResult<ContentRead> {
        let (entity, schema) = self.load(collection, id).await?;
        let prop = schema.resolve(property)?;
        single_valued(prop, "Read")?;

        let value = prop
            .get(&entity)
            .ok_or_else(|| ContentError::no_content(format!("No content stored for '{property}'")))?;
        let (content_id, entry) = self.bound_id(prop, value)?;

        let mime_type = entry.descriptor().mime_type(value);
        let resource = entry
            .store()
            .get(&content_id)
            .await?
            .ok_or_else(|| ContentError::no_content(format!("Content {content_id} of '{property}' is gone")))?;

        debug!(content_id = %content_id, size = resource.size_bytes, "content resolved");
        Ok(ContentRead {
            content_id,
            mime_type,
            resource,
        })
    }

    /// Store `stream` on the property. Single-valued properties are created or
    /// overwritten in place; arrays grow by one slot and collections by one
    /// member.
    #[instrument(skip(self, stream))]
    pub async fn write(
        &self,
        collection: &str,
        id: &str,
        property: &str,
        mime_type: Option<&str>,
        stream: ByteStream,
    ) -> ContentResult<BoundContent> {
        let _guard = self.lock(collection, id).await;
        let (mut entity, schema) = self.load(collection, id).await?;
        let prop = schema.resolve(property)?;

        let content_type = write_type(prop, &entity)?;
        let entry = self.registry.find_store(&content_type)?;
        debug!(content_type = %content_type, shape = %prop.shape(), "store resolved");

        let slot = materialize(prop, &mut entity, &entry)?;
        let target = prop
            .member_mut(&mut entity, slot)
            .ok_or_else(|| ContentError::malformed(format!("'{property}' lost its target value")))?;
        let descriptor = entry.descriptor();
        descriptor.set_mime_type(target, mime_type)?;
        let existing = descriptor.content_id(target);

        let put = entry.store().put(existing.as_ref(), stream).await?;
        let content_id = put.id.clone();

        let value = match self.bind(prop, &mut entity, slot, &entry, &content_id) {
            Ok(value) => value,
            Err(err) => return Err(self.partial(content_id, "written", err)),
        };
        if let Err(err) = self.repository.save(collection, entity).await {
            return Err(self.partial(content_id, "written", err));
        }

        info!(
            content_id = %content_id,
            size = put.size_bytes,
            reused = existing.is_some(),
            "content written"
        );
        Ok(BoundContent {
            value,
            content_id,
            size_bytes: put.size_bytes,
            etag: put.etag,
        })
    }

    /// Remove the payload of a single-valued property and clear its mime type.
    /// The content id is cleared too unless the delete policy retains it.
    #[instrument(skip(self))]
    pub async fn delete(&self, collection: &str, id: &str, property: &str) -> ContentResult<ContentId> {
        let _guard = self.lock(collection, id).await;
        let (mut entity, schema) = self.load(collection, id).await?;
        let prop = schema.resolve(property)?;
        single_valued(prop, "Delete")?;

        let value = prop
            .get(&entity)
            .ok_or_else(|| ContentError::no_content(format!("No content stored for '{property}'")))?;
        let (content_id, entry) = self.bound_id(prop, value)?;

        entry.store().delete(&content_id).await?;

        if let Err(err) = self.unbind(prop, &mut entity, &entry) {
            return Err(self.partial(content_id, "deleted", err));
        }
        if let Err(err) = self.repository.save(collection, entity).await {
            return Err(self.partial(content_id, "deleted", err));
        }

        info!(content_id = %content_id, policy = ?self.config.delete_policy, "content deleted");
        Ok(content_id)
    }

    async fn lock(&self, collection: &str, id: &str) -> Option<OwnedMutexGuard<()>> {
        if self.config.serialize_mutations {
            Some(self.locks.acquire(collection, id).await)
        } else {
            None
        }
    }

    async fn load(&self, collection: &str, id: &str) -> ContentResult<(Value, Arc<EntitySchema>)> {
        let entity = self
            .repository
            .find_one(collection, id)
            .await
            .map_err(ContentError::repository)?
            .ok_or_else(|| ContentError::entity_not_found(collection, id))?;
        let schema = self
            .repository
            .schema_of(collection, &entity)
            .ok_or_else(|| ContentError::entity_not_found(collection, id))?;
        Ok((entity, schema))
    }

    /// Content id and store of an existing value, for Read and Delete.
    fn bound_id(&self, prop: &PropertyRef, value: &Value) -> ContentResult<(ContentId, StoreEntry)> {
        let content_type = runtime_type(value, prop.element_type());
        let descriptor = self
            .registry
            .descriptor(&content_type)
            .ok_or_else(|| ContentError::no_content("Missing content id"))?;
        let content_id = descriptor
            .content_id(value)
            .ok_or_else(|| ContentError::no_content(format!("'{}' has no stored content", prop.name())))?;
        let entry = self.registry.find_store(&content_type)?;
        Ok((content_id, entry))
    }

    fn bind(
        &self,
        prop: &PropertyRef,
        entity: &mut Value,
        slot: Slot,
        entry: &StoreEntry,
        content_id: &ContentId,
    ) -> ContentResult<Value> {
        let target = prop
            .member_mut(entity, slot)
            .ok_or_else(|| ContentError::malformed(format!("'{}' lost its target value", prop.name())))?;
        entry.descriptor().set_content_id(target, Some(content_id))?;
        Ok(target.clone())
    }

    fn unbind(&self, prop: &PropertyRef, entity: &mut Value, entry: &StoreEntry) -> ContentResult<()> {
        let target = prop
            .get_mut(entity)
            .ok_or_else(|| ContentError::malformed(format!("'{}' lost its value", prop.name())))?;
        let descriptor = entry.descriptor();
        descriptor.set_mime_type(target, None)?;
        if self.config.delete_policy == DeletePolicy::ClearContentId {
            descriptor.set_content_id(target, None)?;
        }
        Ok(())
    }

    fn partial<E>(&self, content_id: ContentId, operation: &'static str, err: E) -> ContentError
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let err = ContentError::partial_failure(content_id, operation, err);
        warn!(error = %err, "store changed but entity was not saved");
        err
    }
}

fn single_valued(prop: &PropertyRef, operation: &str) -> ContentResult<()> {
    if prop.shape().is_multi_valued() {
        return Err(ContentError::shape_mismatch(format!(
            "{operation} of '{}' is not supported: the property is {}",
            prop.name(),
            prop.shape()
        )));
    }
    Ok(())
}

/// Content-bearing type a Write stores under: the declared type, except that
/// a non-empty array follows the runtime type of its first element.
fn write_type(prop: &PropertyRef, entity: &Value) -> ContentResult<ContentTypeName> {
    let declared = prop.element_type();
    match prop.shape() {
        PropertyShape::Array => Ok(prop
            .elements(entity)?
            .and_then(|items| items.first())
            .map_or_else(|| declared.clone(), |first| runtime_type(first, declared))),
        PropertyShape::Single | PropertyShape::CollectionLike => Ok(declared.clone()),
    }
}

/// Put the target value in place and say where it is.
fn materialize(prop: &PropertyRef, entity: &mut Value, entry: &StoreEntry) -> ContentResult<Slot> {
    match prop.shape() {
        PropertyShape::Single => {
            if prop.get(entity).is_none() {
                prop.set(entity, instantiate(prop, entry))?;
            }
            Ok(Slot::Value)
        }
        PropertyShape::Array => {
            let mut grown = prop
                .elements(entity)?
                .cloned()
                .ok_or_else(|| {
                    ContentError::unimplemented(format!(
                        "'{}' is nil; allocating an array for it is not supported",
                        prop.name()
                    ))
                })?;
            grown.push(instantiate(prop, entry));
            let index = grown.len() - 1;
            prop.set(entity, Value::Array(grown))?;
            Ok(Slot::Member(index))
        }
        PropertyShape::CollectionLike => {
            let index = prop.append(entity, instantiate(prop, entry))?;
            Ok(Slot::Member(index))
        }
    }
}

/// Fresh value from the type's factory, tagged when it is not the declared type.
fn instantiate(prop: &PropertyRef, entry: &StoreEntry) -> Value {
    let descriptor = entry.descriptor();
    let mut value = descriptor.instantiate();
    if descriptor.name() != prop.element_type() {
        if let Some(fields) = value.as_object_mut() {
            fields.insert(TYPE_TAG.to_string(), Value::String(descriptor.name().to_string()));
        }
    }
    value
}
