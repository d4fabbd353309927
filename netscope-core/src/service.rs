use crate::error::ServiceError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A live service instance whose marked operations can be called remotely.
#[async_trait]
pub trait ServiceTarget: Send + Sync {
    /// Qualified runtime type name, matching an entry in the type catalog.
    fn type_name(&self) -> &str;

    /// Call an operation with arguments already coerced to declared types.
    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError>;

    /// Read an exposed field.
    async fn get_field(&self, field: &str) -> Result<Value, ServiceError> {
        Err(ServiceError::UnknownField(field.to_string()))
    }

    /// Write an exposed field.
    async fn set_field(&self, field: &str, _value: Value) -> Result<(), ServiceError> {
        Err(ServiceError::UnknownField(field.to_string()))
    }

    /// The decorated instance, when this target is a proxy.
    fn proxied_target(&self) -> Option<&dyn ServiceTarget> {
        None
    }
}

impl std::fmt::Debug for dyn ServiceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTarget")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Resolves an instance to its true underlying type.
pub trait Unwrapper: Send + Sync + std::fmt::Debug {
    fn unwrap(&self, instance: &dyn ServiceTarget) -> String;
}

/// Follows `proxied_target` down to the innermost instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyUnwrapper;

impl Unwrapper for ProxyUnwrapper {
    fn unwrap(&self, instance: &dyn ServiceTarget) -> String {
        let mut current = instance;
        while let Some(inner) = current.proxied_target() {
            current = inner;
        }
        current.type_name().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No instance named {0}")]
    NotFound(String),

    #[error("Instance {name} could not be materialized: {reason}")]
    Unavailable { name: String, reason: String },
}

/// Supplies the live instances the registry scans.
pub trait InstanceSource: Send + Sync {
    fn instance_names(&self) -> Vec<String>;

    fn resolve(&self, name: &str) -> Result<Arc<dyn ServiceTarget>, ResolveError>;
}

/// In-memory instance source; keeps the instances alive for the registry.
#[derive(Default)]
pub struct StaticInstanceSource {
    names: Vec<String>,
    instances: HashMap<String, Arc<dyn ServiceTarget>>,
}

impl StaticInstanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, instance: Arc<dyn ServiceTarget>) -> Self {
        self.insert(name, instance);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, instance: Arc<dyn ServiceTarget>) {
        let name = name.into();
        if self.instances.insert(name.clone(), instance).is_none() {
            self.names.push(name);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl std::fmt::Debug for StaticInstanceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticInstanceSource")
            .field("names", &self.names)
            .finish()
    }
}

impl InstanceSource for StaticInstanceSource {
    fn instance_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn ServiceTarget>, ResolveError> {
        self.instances
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }
}

/// Positional arguments after coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Arguments { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, ServiceError> {
        let value = self.values.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| ServiceError::InvalidArgument {
            index,
            message: e.to_string(),
        })
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Arguments::new(values)
    }
}
