//! # Configuration
//!
//! Same shape as the DogRS app config: a flat string key/value store that
//! applications fill however they like, plus an environment loader.
//!
//! ```rust
//! use dog_content::{BinderConfig, ContentConfig, DeletePolicy};
//!
//! let mut config = ContentConfig::new();
//! config.set("binder.delete_policy", "retain");
//!
//! let binder = BinderConfig::from_config(&config).unwrap();
//! assert_eq!(binder.delete_policy, DeletePolicy::RetainContentId);
//! ```
//!
//! `ContentConfig::from_env("DOG_CONTENT__")` maps
//! `DOG_CONTENT__BINDER__DELETE_POLICY=retain` to `binder.delete_policy`.

use std::collections::HashMap;
use std::str::FromStr;

use dog_blob::BlobConfig;

use crate::{ContentError, ContentResult};

#[derive(Debug, Default, Clone)]
pub struct ContentConfig {
    values: HashMap<String, String>,
}

impl ContentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every variable starting with `prefix`, lowercased, with `__`
    /// turned into `.`.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    pub fn from_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                config.set(stripped.to_lowercase().replace("__", "."), value);
            }
        }
        config
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// Parse a typed value; a present but unparsable value is a configuration error.
    pub fn parse<T: FromStr>(&self, key: &str) -> ContentResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ContentError::configuration(format!("invalid value {raw:?} for {key}"))),
        }
    }

    /// Store limits from `store.max_blob_bytes`
    pub fn blob_config(&self) -> ContentResult<BlobConfig> {
        let mut config = BlobConfig::default();
        if let Some(max) = self.parse::<u64>("store.max_blob_bytes")? {
            config = config.with_max_blob_bytes(max);
        }
        Ok(config)
    }
}

/// What Delete does with the content id left on the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Clear the id, fully retiring the value.
    #[default]
    ClearContentId,
    /// Keep the id as a soft-delete marker. Rewriting such a value fails,
    /// because stores refuse retired ids.
    RetainContentId,
}

impl FromStr for DeletePolicy {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::ClearContentId),
            "retain" => Ok(Self::RetainContentId),
            other => Err(ContentError::configuration(format!(
                "unknown delete policy {other:?} (expected \"clear\" or \"retain\")"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinderConfig {
    pub delete_policy: DeletePolicy,
    /// Serialize Write/Delete per (collection, id) from load to save.
    pub serialize_mutations: bool,
}

impl BinderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `binder.delete_policy` and `binder.serialize_mutations`
    pub fn from_config(config: &ContentConfig) -> ContentResult<Self> {
        let mut out = Self::default();
        if let Some(policy) = config.get("binder.delete_policy") {
            out.delete_policy = policy.trim().parse()?;
        }
        if let Some(serialize) = config.parse::<bool>("binder.serialize_mutations")? {
            out.serialize_mutations = serialize;
        }
        Ok(out)
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn serialize_mutations(mut self) -> Self {
        self.serialize_mutations = true;
        self
    }
}
