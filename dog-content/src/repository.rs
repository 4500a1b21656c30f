use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::EntitySchema;

/// Persistence collaborator that owns entities.
///
/// The binder never creates or destroys entities: it loads one, mutates a
/// content property in place and hands the document back to `save`.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    async fn save(&self, collection: &str, entity: Value) -> Result<Value>;

    /// Content schema for an entity of `collection`; `None` when the entity
    /// is not a content-bearing domain object.
    fn schema_of(&self, collection: &str, entity: &Value) -> Option<Arc<EntitySchema>>;
}

struct MemoryCollection {
    schema: Arc<EntitySchema>,
    id_field: String,
    entities: HashMap<String, Value>,
}

/// In-memory repository keyed by collection name, for tests and demos.
#[derive(Default)]
pub struct MemoryRepository {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

fn entity_id(entity: &Value, id_field: &str) -> Option<String> {
    match entity.get(id_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection whose entities carry their id in `"id"`
    pub fn with_collection<S: Into<String>>(self, name: S, schema: EntitySchema) -> Self {
        self.register_collection(name, "id", schema);
        self
    }

    pub fn register_collection<N, F>(&self, name: N, id_field: F, schema: EntitySchema)
    where
        N: Into<String>,
        F: Into<String>,
    {
        self.collections.write().insert(
            name.into(),
            MemoryCollection {
                schema: Arc::new(schema),
                id_field: id_field.into(),
                entities: HashMap::new(),
            },
        );
    }

    /// Insert or replace an entity without going through `save`
    pub fn insert(&self, collection: &str, entity: Value) -> Result<()> {
        let mut collections = self.collections.write();
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("unknown collection {collection}"))?;
        let id = entity_id(&entity, &coll.id_field)
            .ok_or_else(|| anyhow!("entity in {collection} has no {} field", coll.id_field))?;
        coll.entities.insert(id, entity);
        Ok(())
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.entities.len())
    }
}

#[async_trait]
impl EntityRepository for MemoryRepository {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.entities.get(id))
            .cloned())
    }

    async fn save(&self, collection: &str, entity: Value) -> Result<Value> {
        self.insert(collection, entity.clone())?;
        Ok(entity)
    }

    fn schema_of(&self, collection: &str, _entity: &Value) -> Option<Arc<EntitySchema>> {
        self.collections
            .read()
            .get(collection)
            .map(|c| Arc::clone(&c.schema))
    }
}
