//! # Errors
//!
//! Every binder operation fails with a [`ContentError`]. Each variant maps to
//! a Feathers-style [`ErrorKind`] (status code + `name` + `className`) so a
//! transport crate can render it without knowing the taxonomy.
//!
//! [`ContentError::PartialFailure`] is the one to watch: the payload in the
//! store already changed but the entity was not saved. Nothing is retried or
//! rolled back automatically.

use dog_blob::{BlobError, ContentId};
use serde_json::{json, Value};
use thiserror::Error;

pub type ContentResult<T> = Result<T, ContentError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why an operation was refused for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedKind {
    /// Single-resource operation on an array or collection property.
    ShapeMismatch,
    /// Behavior with no policy yet, e.g. allocating a nil collection.
    Unimplemented,
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Entity not found: {collection}/{id}")]
    EntityNotFound { collection: String, id: String },

    #[error("No such content property '{property}' on {entity}")]
    PropertyNotFound { entity: String, property: String },

    #[error("{message}")]
    NoContent { message: String },

    #[error("Unable to find a content store for {content_type}")]
    StoreNotFound { content_type: String },

    #[error("{message}")]
    Unsupported { kind: UnsupportedKind, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Content {content_id} was {operation} but the entity was not saved: {source}")]
    PartialFailure {
        content_id: ContentId,
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Malformed entity: {message}")]
    MalformedEntity { message: String },

    #[error(transparent)]
    Store(#[from] BlobError),

    #[error("Repository error: {source}")]
    Repository {
        #[source]
        source: BoxError,
    },
}

impl ContentError {
    pub fn entity_not_found(collection: &str, id: &str) -> Self {
        Self::EntityNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn property_not_found(entity: &str, property: &str) -> Self {
        Self::PropertyNotFound {
            entity: entity.to_string(),
            property: property.to_string(),
        }
    }

    pub fn no_content<S: Into<String>>(message: S) -> Self {
        Self::NoContent {
            message: message.into(),
        }
    }

    pub fn store_not_found<S: ToString>(content_type: S) -> Self {
        Self::StoreNotFound {
            content_type: content_type.to_string(),
        }
    }

    pub fn shape_mismatch<S: Into<String>>(message: S) -> Self {
        Self::Unsupported {
            kind: UnsupportedKind::ShapeMismatch,
            message: message.into(),
        }
    }

    pub fn unimplemented<S: Into<String>>(message: S) -> Self {
        Self::Unsupported {
            kind: UnsupportedKind::Unimplemented,
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedEntity {
            message: message.into(),
        }
    }

    /// Repositories speak `anyhow`, like DogRS services do.
    pub fn repository(error: anyhow::Error) -> Self {
        Self::Repository {
            source: error.into(),
        }
    }

    pub fn partial_failure<E: Into<BoxError>>(content_id: ContentId, operation: &'static str, source: E) -> Self {
        Self::PartialFailure {
            content_id,
            operation,
            source: source.into(),
        }
    }

    pub fn is_partial_failure(&self) -> bool {
        matches!(self, Self::PartialFailure { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityNotFound { .. } | Self::PropertyNotFound { .. } | Self::NoContent { .. } => {
                ErrorKind::NotFound
            }
            Self::Unsupported {
                kind: UnsupportedKind::ShapeMismatch,
                ..
            } => ErrorKind::MethodNotAllowed,
            Self::Unsupported {
                kind: UnsupportedKind::Unimplemented,
                ..
            } => ErrorKind::NotImplemented,
            Self::Store(BlobError::Invalid { .. }) => ErrorKind::BadRequest,
            Self::Store(BlobError::Retired { .. }) => ErrorKind::Conflict,
            Self::StoreNotFound { .. }
            | Self::Configuration { .. }
            | Self::PartialFailure { .. }
            | Self::MalformedEntity { .. }
            | Self::Store(_)
            | Self::Repository { .. } => ErrorKind::GeneralError,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Feathers-ish JSON payload, safe to hand to clients.
    pub fn to_json(&self) -> Value {
        let kind = self.kind();
        let mut base = json!({
            "name": kind.name(),
            "message": self.to_string(),
            "code": kind.status_code(),
            "className": kind.class_name(),
        });

        if let Self::PartialFailure {
            content_id, operation, ..
        } = self
        {
            base["data"] = json!({
                "partial": true,
                "contentId": content_id,
                "operation": operation,
            });
        }
        base
    }
}

/// Feathers error classes used by the content surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotFound,         // 404
    MethodNotAllowed, // 405
    Conflict,         // 409
    GeneralError,     // 500
    NotImplemented,   // 501
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Conflict => 409,
            ErrorKind::GeneralError => 500,
            ErrorKind::NotImplemented => 501,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::NotImplemented => "NotImplemented",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::MethodNotAllowed => "method-not-allowed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::NotImplemented => "not-implemented",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(ContentError::entity_not_found("documents", "1").code(), 404);
        assert_eq!(ContentError::property_not_found("documents", "x").code(), 404);
        assert_eq!(ContentError::no_content("empty").code(), 404);
        assert_eq!(ContentError::shape_mismatch("collection").code(), 405);
        assert_eq!(ContentError::unimplemented("nil collection").code(), 501);
        assert_eq!(ContentError::store_not_found("File").code(), 500);
        assert_eq!(ContentError::from(BlobError::retired("c1")).code(), 409);
        assert_eq!(ContentError::from(BlobError::invalid("too big")).code(), 400);
    }

    #[test]
    fn partial_failure_carries_content_id() {
        let err = ContentError::partial_failure(ContentId::from("c1"), "written", anyhow::anyhow!("db down"));
        assert!(err.is_partial_failure());

        let body = err.to_json();
        assert_eq!(body["code"], 500);
        assert_eq!(body["className"], "general-error");
        assert_eq!(body["data"]["partial"], true);
        assert_eq!(body["data"]["contentId"], "c1");
        assert!(body["message"].as_str().unwrap().contains("db down"));
    }

    #[test]
    fn missing_property_and_missing_content_read_differently() {
        let missing_property = ContentError::property_not_found("documents", "cover").to_string();
        let missing_content = ContentError::no_content("attachment has no stored content").to_string();
        assert!(missing_property.contains("No such content property"));
        assert!(missing_content.contains("no stored content"));
    }
}
