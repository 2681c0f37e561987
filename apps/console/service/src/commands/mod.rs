//! Declarative operation registry.
//!
//! Every REST-reachable core operation is one [`OperationDescriptor`]: its
//! dotted name, HTTP method, auth requirement, and the ordered parameter
//! table whose order is the positional RPC argument order. The registry
//! derives its lookup indexes and the global query-key allow-list from the
//! descriptor tables; routing code never hardcodes an operation.

use std::collections::{HashMap, HashSet};

use axum::http::Method;
use serde::Serialize;
use stratus_zone_client::RpcValue;

pub mod datastore;
pub mod group;
pub mod host;
pub mod image;
pub mod network;
pub mod template;
pub mod user;
pub mod vm;
pub mod zone;

/// Query keys the gateway reserves for itself, legal on any operation.
pub const RESERVED_QUERY_KEYS: [&str; 1] = ["zone"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    Path,
    Query,
    Body,
}

impl ParamSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
        }
    }
}

/// Element kind for list parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Number,
    Text,
}

/// A resolved (or default) argument value. The kind of a parameter's
/// declared default decides the kind of every resolved value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Number(i64),
    Text(String),
    List {
        element: ScalarKind,
        items: Vec<ParamValue>,
    },
}

impl ParamValue {
    pub fn to_rpc(&self) -> RpcValue {
        match self {
            Self::Bool(flag) => RpcValue::Bool(*flag),
            Self::Number(n) => RpcValue::Int(*n),
            Self::Text(text) => RpcValue::Text(text.clone()),
            Self::List { items, .. } => {
                RpcValue::Array(items.iter().map(ParamValue::to_rpc).collect())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub source: ParamSource,
    pub default: ParamValue,
}

impl ParamSpec {
    pub fn number(name: &'static str, source: ParamSource, default: i64) -> Self {
        Self {
            name,
            source,
            default: ParamValue::Number(default),
        }
    }

    pub fn text(name: &'static str, source: ParamSource, default: &str) -> Self {
        Self {
            name,
            source,
            default: ParamValue::Text(default.to_string()),
        }
    }

    pub fn flag(name: &'static str, source: ParamSource, default: bool) -> Self {
        Self {
            name,
            source,
            default: ParamValue::Bool(default),
        }
    }

    /// List parameter with an empty default; `element` fixes the item kind.
    pub fn list(name: &'static str, source: ParamSource, element: ScalarKind) -> Self {
        Self {
            name,
            source,
            default: ParamValue::List {
                element,
                items: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Get),
            Method::POST => Some(Self::Post),
            Method::PUT => Some(Self::Put),
            Method::DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Typed registry key; families and verbs are matched exactly, never by
/// pasting strings together at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub family: String,
    pub verb: String,
}

impl OperationKey {
    pub fn new(family: &str, verb: &str) -> Self {
        Self {
            family: family.to_string(),
            verb: verb.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub method: HttpMethod,
    pub requires_auth: bool,
    pub params: Vec<ParamSpec>,
}

impl OperationDescriptor {
    pub fn new(
        name: &str,
        method: HttpMethod,
        requires_auth: bool,
        params: Vec<ParamSpec>,
    ) -> Self {
        Self {
            name: name.to_string(),
            method,
            requires_auth,
            params,
        }
    }

    /// `family.verb` split; `None` marks a malformed name.
    pub fn key(&self) -> Option<OperationKey> {
        let (family, verb) = self.name.split_once('.')?;
        if family.is_empty() || verb.is_empty() {
            return None;
        }
        Some(OperationKey::new(family, verb))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    by_key: HashMap<OperationKey, OperationDescriptor>,
    verbs_by_family: HashMap<String, HashSet<String>>,
    query_keys: HashSet<String>,
}

impl CommandRegistry {
    /// The full built-in descriptor set, one table per resource family.
    pub fn builtin() -> Self {
        let mut descriptors = Vec::new();
        descriptors.extend(datastore::descriptors());
        descriptors.extend(group::descriptors());
        descriptors.extend(host::descriptors());
        descriptors.extend(image::descriptors());
        descriptors.extend(network::descriptors());
        descriptors.extend(template::descriptors());
        descriptors.extend(user::descriptors());
        descriptors.extend(vm::descriptors());
        descriptors.extend(zone::descriptors());
        Self::from_descriptors(descriptors)
    }

    /// Builds the indexes. A malformed or duplicate descriptor is dropped
    /// with a warning; one bad table entry must never take the gateway down.
    pub fn from_descriptors(descriptors: Vec<OperationDescriptor>) -> Self {
        let mut registry = Self::default();
        for key in RESERVED_QUERY_KEYS {
            registry.query_keys.insert(key.to_string());
        }
        for descriptor in descriptors {
            let Some(key) = descriptor.key() else {
                tracing::warn!(
                    name = descriptor.name.as_str(),
                    "dropping descriptor without a family.verb name"
                );
                continue;
            };
            if registry.by_key.contains_key(&key) {
                tracing::warn!(
                    name = descriptor.name.as_str(),
                    "dropping duplicate descriptor"
                );
                continue;
            }
            for param in &descriptor.params {
                if matches!(param.source, ParamSource::Path | ParamSource::Query) {
                    registry.query_keys.insert(param.name.to_string());
                }
            }
            registry
                .verbs_by_family
                .entry(key.family.clone())
                .or_default()
                .insert(key.verb.clone());
            registry.by_key.insert(key, descriptor);
        }
        registry
    }

    pub fn resolve(&self, family: &str, verb: &str) -> Option<&OperationDescriptor> {
        self.by_key.get(&OperationKey::new(family, verb))
    }

    pub fn is_known_family(&self, family: &str) -> bool {
        self.verbs_by_family.contains_key(family)
    }

    pub fn knows_verb(&self, family: &str, verb: &str) -> bool {
        self.verbs_by_family
            .get(family)
            .is_some_and(|verbs| verbs.contains(verb))
    }

    /// The derived allow-list: a query key is legal iff some descriptor
    /// declares it as a path or query parameter, or the gateway reserves it.
    pub fn allows_query_key(&self, key: &str) -> bool {
        self.query_keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
