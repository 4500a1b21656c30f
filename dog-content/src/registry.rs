use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dog_blob::{ContentId, ContentStore};
use serde_json::{json, Map, Value};

use crate::{ContentError, ContentResult, ContentTypeName};

/// Builds a fresh, unbound content-bearing value.
pub type ContentFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Static description of a content-bearing type: where its content id and
/// mime type live, and how to instantiate it.
#[derive(Clone)]
pub struct ContentTypeDescriptor {
    name: ContentTypeName,
    content_id_field: String,
    mime_type_field: Option<String>,
    factory: ContentFactory,
}

impl ContentTypeDescriptor {
    pub fn builder<T: Into<ContentTypeName>>(name: T) -> ContentTypeBuilder {
        ContentTypeBuilder {
            name: name.into(),
            content_id_field: None,
            mime_type_field: None,
            factory: None,
        }
    }

    /// `{"contentId": null, "mimeType": null}` with matching field names
    pub fn standard<T: Into<ContentTypeName>>(name: T) -> Self {
        Self {
            name: name.into(),
            content_id_field: "contentId".to_string(),
            mime_type_field: Some("mimeType".to_string()),
            factory: Arc::new(|| json!({"contentId": null, "mimeType": null})),
        }
    }

    pub fn name(&self) -> &ContentTypeName {
        &self.name
    }

    pub fn content_id_field(&self) -> &str {
        &self.content_id_field
    }

    pub fn mime_type_field(&self) -> Option<&str> {
        self.mime_type_field.as_deref()
    }

    pub fn instantiate(&self) -> Value {
        (self.factory)()
    }

    pub fn content_id(&self, value: &Value) -> Option<ContentId> {
        match value.get(&self.content_id_field)? {
            Value::String(s) if !s.is_empty() => Some(ContentId::from_string(s.clone())),
            Value::Number(n) => Some(ContentId::from_string(n.to_string())),
            _ => None,
        }
    }

    pub fn set_content_id(&self, value: &mut Value, id: Option<&ContentId>) -> ContentResult<()> {
        let id = id.map_or(Value::Null, |id| Value::String(id.to_string()));
        fields(value, &self.name)?.insert(self.content_id_field.clone(), id);
        Ok(())
    }

    pub fn mime_type(&self, value: &Value) -> Option<String> {
        let field = self.mime_type_field.as_ref()?;
        value.get(field)?.as_str().map(str::to_string)
    }

    /// No-op when the type declares no mime type field.
    pub fn set_mime_type(&self, value: &mut Value, mime_type: Option<&str>) -> ContentResult<()> {
        let Some(field) = &self.mime_type_field else {
            return Ok(());
        };
        let mime = mime_type.map_or(Value::Null, |m| Value::String(m.to_string()));
        fields(value, &self.name)?.insert(field.clone(), mime);
        Ok(())
    }
}

fn fields<'a>(value: &'a mut Value, ty: &ContentTypeName) -> ContentResult<&'a mut Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| ContentError::malformed(format!("{ty} value is not a JSON object")))
}

impl fmt::Debug for ContentTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentTypeDescriptor")
            .field("name", &self.name)
            .field("content_id_field", &self.content_id_field)
            .field("mime_type_field", &self.mime_type_field)
            .finish_non_exhaustive()
    }
}

pub struct ContentTypeBuilder {
    name: ContentTypeName,
    content_id_field: Option<String>,
    mime_type_field: Option<String>,
    factory: Option<ContentFactory>,
}

impl ContentTypeBuilder {
    pub fn content_id<S: Into<String>>(mut self, field: S) -> Self {
        self.content_id_field = Some(field.into());
        self
    }

    pub fn mime_type<S: Into<String>>(mut self, field: S) -> Self {
        self.mime_type_field = Some(field.into());
        self
    }

    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> ContentResult<ContentTypeDescriptor> {
        let content_id_field = self.content_id_field.ok_or_else(|| {
            ContentError::configuration(format!("content type {} has no content id field", self.name))
        })?;
        let factory = self.factory.ok_or_else(|| {
            ContentError::configuration(format!("content type {} has no factory", self.name))
        })?;
        Ok(ContentTypeDescriptor {
            name: self.name,
            content_id_field,
            mime_type_field: self.mime_type_field,
            factory,
        })
    }
}

/// A registry hit: the store for a type plus its descriptor.
#[derive(Clone)]
pub struct StoreEntry {
    descriptor: Arc<ContentTypeDescriptor>,
    store: Arc<dyn ContentStore>,
}

impl StoreEntry {
    pub fn descriptor(&self) -> &ContentTypeDescriptor {
        &self.descriptor
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }
}

/// Maps content-bearing types to the store that owns their payloads.
///
/// Built once at startup and read-only afterwards. Lookups are by exact type
/// name: a subtype tag that was not itself registered does not fall back to
/// its parent's store.
pub struct StoreRegistry {
    types: HashMap<ContentTypeName, Arc<ContentTypeDescriptor>>,
    stores: HashMap<ContentTypeName, Arc<dyn ContentStore>>,
}

impl StoreRegistry {
    pub fn builder() -> StoreRegistryBuilder {
        StoreRegistryBuilder::default()
    }

    pub fn find_store(&self, content_type: &ContentTypeName) -> ContentResult<StoreEntry> {
        match (self.types.get(content_type), self.stores.get(content_type)) {
            (Some(descriptor), Some(store)) => Ok(StoreEntry {
                descriptor: Arc::clone(descriptor),
                store: Arc::clone(store),
            }),
            _ => Err(ContentError::store_not_found(content_type)),
        }
    }

    pub fn descriptor(&self, content_type: &ContentTypeName) -> Option<&ContentTypeDescriptor> {
        self.types.get(content_type).map(Arc::as_ref)
    }
}

#[derive(Default)]
pub struct StoreRegistryBuilder {
    types: Vec<ContentTypeDescriptor>,
    stores: Vec<(ContentTypeName, Arc<dyn ContentStore>)>,
}

impl StoreRegistryBuilder {
    /// Describe a content-bearing type without giving it a store
    pub fn content_type(mut self, descriptor: ContentTypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    pub fn store<S: ContentStore + 'static>(self, content_type: impl Into<ContentTypeName>, store: S) -> Self {
        self.shared_store(content_type, Arc::new(store))
    }

    /// One store instance may serve several types
    pub fn shared_store(mut self, content_type: impl Into<ContentTypeName>, store: Arc<dyn ContentStore>) -> Self {
        self.stores.push((content_type.into(), store));
        self
    }

    /// Describe a type and register its store in one go
    pub fn register<S: ContentStore + 'static>(self, descriptor: ContentTypeDescriptor, store: S) -> Self {
        let name = descriptor.name().clone();
        self.content_type(descriptor).store(name, store)
    }

    /// Validate and freeze. Duplicate types, duplicate stores and stores for
    /// undescribed types are configuration errors.
    pub fn build(self) -> ContentResult<StoreRegistry> {
        let mut types = HashMap::with_capacity(self.types.len());
        for descriptor in self.types {
            let name = descriptor.name().clone();
            if types.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(ContentError::configuration(format!("content type {name} described twice")));
            }
        }

        let mut stores: HashMap<ContentTypeName, Arc<dyn ContentStore>> = HashMap::with_capacity(self.stores.len());
        for (name, store) in self.stores {
            if !types.contains_key(&name) {
                return Err(ContentError::configuration(format!(
                    "store registered for {name}, which has no content type descriptor"
                )));
            }
            if stores.insert(name.clone(), store).is_some() {
                return Err(ContentError::configuration(format!(
                    "more than one store registered for {name}"
                )));
            }
        }

        tracing::debug!(types = types.len(), stores = stores.len(), "store registry built");
        Ok(StoreRegistry { types, stores })
    }
}
