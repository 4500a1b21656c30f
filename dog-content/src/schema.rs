//! # Entity schemas and the property resolver
//!
//! Entities are JSON documents. Which of their fields are content properties,
//! and of which content-bearing type, is declared once per collection with an
//! [`EntitySchema`]. Resolving a property returns a [`PropertyRef`]: the
//! property's shape, its element type, and accessors over an entity value.
//!
//! ```rust
//! use dog_content::{DeclaredType, EntitySchema, PropertyShape};
//!
//! let schema = EntitySchema::builder("documents")
//!     .property("attachment", DeclaredType::value("File"))
//!     .property("renditions", DeclaredType::list("File"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.resolve("attachment").unwrap().shape(), PropertyShape::Single);
//! assert_eq!(schema.resolve("renditions").unwrap().shape(), PropertyShape::CollectionLike);
//! assert!(schema.resolve("cover").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::{ContentError, ContentResult};

/// Reserved field naming the runtime content-bearing type of a value.
/// Values without it are of their property's declared element type.
pub const TYPE_TAG: &str = "@type";

/// Name of a content-bearing type, the key of the store registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentTypeName(String);

impl ContentTypeName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentTypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ContentTypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The runtime type of a content-bearing value: its `@type` tag, or `declared`.
pub fn runtime_type(value: &Value, declared: &ContentTypeName) -> ContentTypeName {
    value
        .get(TYPE_TAG)
        .and_then(Value::as_str)
        .map(ContentTypeName::from)
        .unwrap_or_else(|| declared.clone())
}

/// Declared type of a property, as written in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// A single content-bearing value
    Value(ContentTypeName),
    /// Fixed-size homogeneous sequence
    FixedArray(ContentTypeName),
    /// Ordered dynamic sequence
    List(ContentTypeName),
    /// Unordered dynamic sequence
    Set(ContentTypeName),
}

impl DeclaredType {
    pub fn value<T: Into<ContentTypeName>>(ty: T) -> Self {
        Self::Value(ty.into())
    }

    pub fn fixed_array<T: Into<ContentTypeName>>(ty: T) -> Self {
        Self::FixedArray(ty.into())
    }

    pub fn list<T: Into<ContentTypeName>>(ty: T) -> Self {
        Self::List(ty.into())
    }

    pub fn set<T: Into<ContentTypeName>>(ty: T) -> Self {
        Self::Set(ty.into())
    }

    pub fn shape(&self) -> PropertyShape {
        match self {
            Self::FixedArray(_) => PropertyShape::Array,
            Self::List(_) | Self::Set(_) => PropertyShape::CollectionLike,
            Self::Value(_) => PropertyShape::Single,
        }
    }

    /// Member type for sequences, the declared type itself otherwise.
    pub fn element_type(&self) -> &ContentTypeName {
        match self {
            Self::Value(ty) | Self::FixedArray(ty) | Self::List(ty) | Self::Set(ty) => ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyShape {
    Single,
    Array,
    CollectionLike,
}

impl PropertyShape {
    pub fn is_multi_valued(&self) -> bool {
        !matches!(self, PropertyShape::Single)
    }
}

impl fmt::Display for PropertyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PropertyShape::Single => "single-valued",
            PropertyShape::Array => "array-valued",
            PropertyShape::CollectionLike => "collection-valued",
        })
    }
}

/// Position of a content-bearing value inside its property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Value,
    Member(usize),
}

/// A resolved content property. Computed once when the schema is built and
/// shared by every request; per-request state is only the entity itself.
#[derive(Debug, Clone)]
pub struct PropertyRef {
    name: String,
    field: String,
    shape: PropertyShape,
    element_type: ContentTypeName,
}

impl PropertyRef {
    fn new(name: String, field: String, declared: &DeclaredType) -> Self {
        Self {
            name,
            field,
            shape: declared.shape(),
            element_type: declared.element_type().clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON field holding the property on the entity document
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn shape(&self) -> PropertyShape {
        self.shape
    }

    pub fn element_type(&self) -> &ContentTypeName {
        &self.element_type
    }

    /// Current value; `None` when the field is missing or null.
    pub fn get<'a>(&self, entity: &'a Value) -> Option<&'a Value> {
        entity.get(&self.field).filter(|v| !v.is_null())
    }

    pub fn get_mut<'a>(&self, entity: &'a mut Value) -> Option<&'a mut Value> {
        entity.get_mut(&self.field).filter(|v| !v.is_null())
    }

    pub fn set(&self, entity: &mut Value, value: Value) -> ContentResult<()> {
        let object = entity
            .as_object_mut()
            .ok_or_else(|| ContentError::malformed("entity is not a JSON object"))?;
        object.insert(self.field.clone(), value);
        Ok(())
    }

    /// Members of an array or collection property; `None` when nil.
    pub fn elements<'a>(&self, entity: &'a Value) -> ContentResult<Option<&'a Vec<Value>>> {
        match self.get(entity) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(ContentError::malformed(format!(
                "{} is {} but does not hold an array",
                self.name, self.shape
            ))),
        }
    }

    /// Append to the live collection and return the new member's index.
    pub fn append(&self, entity: &mut Value, member: Value) -> ContentResult<usize> {
        if self.shape != PropertyShape::CollectionLike {
            return Err(ContentError::shape_mismatch(format!(
                "{} is {}, only collection-valued properties can be appended to",
                self.name, self.shape
            )));
        }
        match entity.get_mut(&self.field) {
            Some(Value::Array(items)) => {
                items.push(member);
                Ok(items.len() - 1)
            }
            None | Some(Value::Null) => Err(ContentError::unimplemented(format!(
                "{} is nil; allocating a collection for it is not supported",
                self.name
            ))),
            Some(_) => Err(ContentError::malformed(format!(
                "{} is collection-valued but does not hold an array",
                self.name
            ))),
        }
    }

    pub fn member_mut<'a>(&self, entity: &'a mut Value, slot: Slot) -> Option<&'a mut Value> {
        match slot {
            Slot::Value => self.get_mut(entity),
            Slot::Member(index) => self.get_mut(entity)?.as_array_mut()?.get_mut(index),
        }
    }
}

/// Content properties of one entity collection.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    properties: HashMap<String, PropertyRef>,
}

impl EntitySchema {
    pub fn builder<S: Into<String>>(name: S) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&self, property: &str) -> ContentResult<&PropertyRef> {
        self.properties
            .get(property)
            .ok_or_else(|| ContentError::property_not_found(&self.name, property))
    }
}

pub struct EntitySchemaBuilder {
    name: String,
    properties: Vec<(String, String, DeclaredType)>,
}

impl EntitySchemaBuilder {
    /// Declare a content property stored under a field of the same name
    pub fn property<S: Into<String>>(self, name: S, declared: DeclaredType) -> Self {
        let name = name.into();
        let field = name.clone();
        self.property_as(name, field, declared)
    }

    /// Declare a content property whose JSON field differs from its URL name
    pub fn property_as<N, F>(mut self, name: N, field: F, declared: DeclaredType) -> Self
    where
        N: Into<String>,
        F: Into<String>,
    {
        self.properties.push((name.into(), field.into(), declared));
        self
    }

    pub fn build(self) -> ContentResult<EntitySchema> {
        let mut properties = HashMap::with_capacity(self.properties.len());
        for (name, field, declared) in self.properties {
            if properties.contains_key(&name) {
                return Err(ContentError::configuration(format!(
                    "content property {name} declared twice on {}",
                    self.name
                )));
            }
            properties.insert(name.clone(), PropertyRef::new(name, field, &declared));
        }
        Ok(EntitySchema {
            name: self.name,
            properties,
        })
    }
}
