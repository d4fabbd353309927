#![allow(dead_code)]

use async_trait::async_trait;
use netscope_core::{
    Arguments, Exposure, FieldDecl, InstanceSource, OperationDecl, ResolveError, ServiceError,
    ServiceTarget, StaticInstanceSource, TypeCatalog, TypeInfo, TypeTag,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `Greeter extends BaseGreeter implements Greets`, with `Greets extends Named`
/// and `BaseGreeter implements Named`.
pub fn greeter_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::interface("app", "Named")
                .operation(OperationDecl::new("name").public().returns(TypeTag::String)),
        )
        .unwrap()
        .register(
            TypeInfo::interface("app", "Greets")
                .implements("app::Named")
                .operation(
                    OperationDecl::new("hello")
                        .public()
                        .returns(TypeTag::String)
                        .doc("interface greeting"),
                )
                .operation(OperationDecl::new("wave").public().returns(TypeTag::String)),
        )
        .unwrap()
        .register(
            TypeInfo::class("app", "BaseGreeter")
                .implements("app::Named")
                .operation(
                    OperationDecl::new("hello")
                        .public()
                        .returns(TypeTag::String)
                        .doc("base greeting"),
                )
                .operation(OperationDecl::new("farewell").restricted().returns(TypeTag::String))
                .operation(OperationDecl::new("internal").returns(TypeTag::String)),
        )
        .unwrap()
        .register(
            TypeInfo::class("app", "Greeter")
                .extends("app::BaseGreeter")
                .implements("app::Greets")
                .implements("std::fmt::Debug")
                .operation(
                    OperationDecl::new("hello")
                        .public()
                        .returns(TypeTag::String)
                        .doc("derived greeting"),
                )
                .operation(
                    OperationDecl::new("greet")
                        .public()
                        .param("name", TypeTag::String)
                        .returns(TypeTag::String),
                )
                .operation(
                    OperationDecl::new("vault")
                        .expose(Exposure::restricted().key("vault-key"))
                        .returns(TypeTag::String),
                ),
        )
        .unwrap();
    catalog
}

/// Canonical keys discovered for one `Greeter` instance, in discovery order.
pub const GREETER_KEYS: &[&str] = &[
    "Greeter.hello",
    "Greeter.greet",
    "Greeter.vault",
    "Greeter.farewell",
    "Greeter.wave",
    "Greeter.name",
];

#[derive(Debug)]
pub struct Greeter {
    type_name: &'static str,
    label: &'static str,
}

impl Greeter {
    pub fn new() -> Self {
        Self::labelled("Greeter")
    }

    pub fn labelled(label: &'static str) -> Self {
        Greeter {
            type_name: "app::Greeter",
            label,
        }
    }
}

#[async_trait]
impl ServiceTarget for Greeter {
    fn type_name(&self) -> &str {
        self.type_name
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        match operation {
            "hello" => Ok(json!(format!("Hello from {}", self.label))),
            "greet" => {
                let name: Option<String> = args.get(0)?;
                Ok(json!(format!(
                    "Hello, {}!",
                    name.unwrap_or_else(|| "stranger".to_string())
                )))
            }
            "vault" => Ok(json!("opened")),
            "farewell" => Ok(json!("Goodbye")),
            "wave" => Ok(json!("*waves*")),
            "name" => Ok(json!(self.label)),
            other => Err(ServiceError::UnknownOperation(other.to_string())),
        }
    }
}

/// A decoration layer that reports its own type but wraps a real service.
pub struct Traced<T> {
    pub inner: T,
}

#[async_trait]
impl<T: ServiceTarget> ServiceTarget for Traced<T> {
    fn type_name(&self) -> &str {
        "proxy::Traced"
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        self.inner.call(operation, args).await
    }

    fn proxied_target(&self) -> Option<&dyn ServiceTarget> {
        Some(&self.inner)
    }
}

pub fn recorder_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::class("app", "Recorder")
                .operation(OperationDecl::new("ping").public().returns(TypeTag::String))
                .operation(
                    OperationDecl::new("echo")
                        .public()
                        .param("count", TypeTag::Int)
                        .param("label", TypeTag::String)
                        .returns(TypeTag::list(TypeTag::Any)),
                )
                .operation(
                    OperationDecl::new("paint")
                        .public()
                        .param("color", TypeTag::enumeration("Color", ["RED", "GREEN"]))
                        .param(
                            "at",
                            TypeTag::structure("Point", [("x", TypeTag::Int), ("y", TypeTag::Int)]),
                        )
                        .param("ratio", TypeTag::Float)
                        .returns(TypeTag::list(TypeTag::Any)),
                )
                .operation(OperationDecl::new("fail").public())
                .operation(OperationDecl::new("explode").public())
                .field(
                    FieldDecl::new("level", TypeTag::Int)
                        .expose(Exposure::public())
                        .writable(),
                )
                .field(FieldDecl::new("serial", TypeTag::String).expose(Exposure::public()))
                .field(FieldDecl::new("secret", TypeTag::String)),
        )
        .unwrap();
    catalog
}

#[derive(Debug)]
pub struct Recorder {
    level: Mutex<Value>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder {
            level: Mutex::new(json!(1)),
        }
    }
}

#[async_trait]
impl ServiceTarget for Recorder {
    fn type_name(&self) -> &str {
        "app::Recorder"
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        match operation {
            "ping" => Ok(json!("pong")),
            "echo" | "paint" => Ok(Value::Array(args.into_vec())),
            "fail" => Err(ServiceError::failed("boom")),
            "explode" => panic!("kaboom"),
            other => Err(ServiceError::UnknownOperation(other.to_string())),
        }
    }

    async fn get_field(&self, field: &str) -> Result<Value, ServiceError> {
        match field {
            "level" => Ok(self.level.lock().clone()),
            "serial" => Ok(json!("R-1")),
            other => Err(ServiceError::UnknownField(other.to_string())),
        }
    }

    async fn set_field(&self, field: &str, value: Value) -> Result<(), ServiceError> {
        match field {
            "level" => {
                *self.level.lock() = value;
                Ok(())
            }
            "serial" => Err(ServiceError::ReadOnlyField(field.to_string())),
            other => Err(ServiceError::UnknownField(other.to_string())),
        }
    }
}

/// Counts how often the registry asks for the instance list.
pub struct CountingSource {
    inner: StaticInstanceSource,
    listings: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: StaticInstanceSource) -> Self {
        CountingSource {
            inner,
            listings: AtomicUsize::new(0),
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

impl InstanceSource for CountingSource {
    fn instance_names(&self) -> Vec<String> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent first callers overlap.
        std::thread::sleep(Duration::from_millis(25));
        self.inner.instance_names()
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn ServiceTarget>, ResolveError> {
        self.inner.resolve(name)
    }
}

/// Fails to materialize the instances named in `broken`.
pub struct FlakySource {
    inner: StaticInstanceSource,
    broken: HashSet<String>,
}

impl FlakySource {
    pub fn new(inner: StaticInstanceSource, broken: &[&str]) -> Self {
        FlakySource {
            inner,
            broken: broken.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InstanceSource for FlakySource {
    fn instance_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.broken.iter().cloned().collect();
        names.sort();
        names.extend(self.inner.instance_names());
        names
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn ServiceTarget>, ResolveError> {
        if self.broken.contains(name) {
            return Err(ResolveError::Unavailable {
                name: name.to_string(),
                reason: "dependency missing".to_string(),
            });
        }
        self.inner.resolve(name)
    }
}

/// Builds a new instance on every `resolve` and keeps no reference to it.
pub struct MaterializingSource {
    resolved: AtomicUsize,
}

impl MaterializingSource {
    pub fn new() -> Self {
        MaterializingSource {
            resolved: AtomicUsize::new(0),
        }
    }

    pub fn resolved(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

impl InstanceSource for MaterializingSource {
    fn instance_names(&self) -> Vec<String> {
        vec!["greeter".to_string()]
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn ServiceTarget>, ResolveError> {
        if name != "greeter" {
            return Err(ResolveError::NotFound(name.to_string()));
        }
        self.resolved.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Greeter::new()))
    }
}
