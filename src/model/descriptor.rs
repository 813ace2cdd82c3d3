use crate::error::FetchError;
use crate::transport::FetchRequest;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Stable identity of a resource inside an orchestrator.
///
/// Slots are addressed by key rather than position, so their state survives a reordering of
/// the descriptor list. By default the key is the resource's target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Request parameters handed to the transport unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub method: Method,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

/// Description of one resource to fetch.
///
/// `deps` is the reactivity key list: replacing a descriptor whose key, target or deps differ
/// from the current one starts a new generation. Parameter-only changes are picked up by the
/// next attempt without triggering one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub key: ResourceKey,
    pub target: String,
    #[serde(default)]
    pub params: RequestParams,
    #[serde(default)]
    pub deps: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            key: ResourceKey::new(target.clone()),
            target,
            params: RequestParams::default(),
            deps: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<ResourceKey>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.params.method = method;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.params.body = Some(body);
        self
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the transport request for one attempt.
    pub fn request(&self) -> FetchRequest {
        FetchRequest {
            key: self.key.clone(),
            target: self.target.clone(),
            params: self.params.clone(),
        }
    }

    fn same_reactivity(&self, other: &Self) -> bool {
        self.key == other.key && self.target == other.target && self.deps == other.deps
    }
}

/// Returns true when switching from `current` to `next` must start a new generation.
pub(crate) fn reactivity_changed(current: &[ResourceDescriptor], next: &[ResourceDescriptor]) -> bool {
    current.len() != next.len()
        || current
            .iter()
            .zip(next)
            .any(|(current, next)| !current.same_reactivity(next))
}

pub(crate) fn check_unique_keys(descriptors: &[ResourceDescriptor]) -> Result<(), FetchError> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if !seen.insert(&descriptor.key) {
            return Err(FetchError::DuplicateKey(descriptor.key.clone()));
        }
    }
    Ok(())
}
