//! NetScope demo server
//!
//! Registers a greeter hierarchy, a calculator with restricted operations and
//! a counter with an exposed field, then serves them over REST and RPC.
//!
//! Usage: `netscope-server [config.json]`. `NETSCOPE_API_KEY` sets the global
//! key and `NETSCOPE_LOG_DIR` the log directory (default `logs`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use netscope_core::{
    Arguments, CapabilityRegistry, Exposure, FieldDecl, HttpMethod, OperationDecl, ServiceError,
    ServiceTarget, StaticInstanceSource, TypeCatalog, TypeInfo, TypeTag,
};
use netscope_server::{logging, NetScopeConfig, NetScopeServer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug)]
struct Greeter;

#[async_trait]
impl ServiceTarget for Greeter {
    fn type_name(&self) -> &str {
        "demo::Greeter"
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        match operation {
            "hello" => Ok(json!("Hello from NetScope")),
            "greet" => {
                let name: Option<String> = args.get(0)?;
                Ok(json!(format!(
                    "Hello, {}!",
                    name.unwrap_or_else(|| "stranger".to_string())
                )))
            }
            "farewell" => Ok(json!("Goodbye")),
            _ => Err(ServiceError::UnknownOperation(operation.to_string())),
        }
    }
}

#[derive(Debug)]
struct Calculator;

#[async_trait]
impl ServiceTarget for Calculator {
    fn type_name(&self) -> &str {
        "demo::Calculator"
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        let a: f64 = args.get(0)?;
        let b: f64 = args.get(1)?;
        match operation {
            "add" => Ok(json!(a + b)),
            "multiply" => Ok(json!(a * b)),
            "divide" => {
                if b == 0.0 {
                    return Err(ServiceError::failed("Division by zero"));
                }
                Ok(json!(a / b))
            }
            _ => Err(ServiceError::UnknownOperation(operation.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct Counter {
    count: AtomicI64,
}

#[async_trait]
impl ServiceTarget for Counter {
    fn type_name(&self) -> &str {
        "demo::Counter"
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        match operation {
            "increment" => {
                let by: i64 = args.get(0)?;
                let by = if by == 0 { 1 } else { by };
                Ok(json!(self.count.fetch_add(by, Ordering::SeqCst) + by))
            }
            _ => Err(ServiceError::UnknownOperation(operation.to_string())),
        }
    }

    async fn get_field(&self, field: &str) -> Result<Value, ServiceError> {
        match field {
            "count" => Ok(json!(self.count.load(Ordering::SeqCst))),
            _ => Err(ServiceError::UnknownField(field.to_string())),
        }
    }

    async fn set_field(&self, field: &str, value: Value) -> Result<(), ServiceError> {
        match field {
            "count" => {
                let count = value.as_i64().unwrap_or_default();
                self.count.store(count, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(ServiceError::UnknownField(field.to_string())),
        }
    }
}

fn demo_catalog() -> Result<TypeCatalog> {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::interface("demo", "Greets")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String)),
        )?
        .register(
            TypeInfo::class("demo", "BaseGreeter")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String))
                .operation(OperationDecl::new("farewell").restricted().returns(TypeTag::String)),
        )?
        .register(
            TypeInfo::class("demo", "Greeter")
                .extends("demo::BaseGreeter")
                .implements("demo::Greets")
                .doc("Friendly greetings")
                .operation(
                    OperationDecl::new("hello")
                        .public()
                        .returns(TypeTag::String)
                        .doc("Say hello"),
                )
                .operation(
                    OperationDecl::new("greet")
                        .expose(Exposure::public().http_method(HttpMethod::Post))
                        .param("name", TypeTag::String)
                        .returns(TypeTag::String)
                        .doc("Greet someone by name"),
                ),
        )?
        .register(
            TypeInfo::class("demo", "Calculator")
                .operation(
                    OperationDecl::new("add")
                        .expose(Exposure::public().http_method(HttpMethod::Post))
                        .param("a", TypeTag::Float)
                        .param("b", TypeTag::Float)
                        .returns(TypeTag::Float),
                )
                .operation(
                    OperationDecl::new("multiply")
                        .restricted()
                        .param("a", TypeTag::Float)
                        .param("b", TypeTag::Float)
                        .returns(TypeTag::Float)
                        .doc("Requires the global API key"),
                )
                .operation(
                    OperationDecl::new("divide")
                        .expose(Exposure::restricted().key("calc-secret").rest(false))
                        .param("a", TypeTag::Float)
                        .param("b", TypeTag::Float)
                        .returns(TypeTag::Float)
                        .doc("RPC only, requires its own key"),
                ),
        )?
        .register(
            TypeInfo::class("demo", "Counter")
                .operation(
                    OperationDecl::new("increment")
                        .expose(Exposure::public().http_method(HttpMethod::Post))
                        .param("by", TypeTag::Int)
                        .returns(TypeTag::Int),
                )
                .field(
                    FieldDecl::new("count", TypeTag::Int)
                        .expose(Exposure::public())
                        .writable()
                        .doc("Current count"),
                ),
        )?;
    Ok(catalog)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::var("NETSCOPE_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    logging::init_logging(&log_dir, "netscope-server")?;

    let config = match std::env::args().nth(1) {
        Some(path) => NetScopeConfig::from_file(&path)
            .with_context(|| format!("loading {}", path))?,
        None => NetScopeConfig::default(),
    }
    .apply_env();

    info!("Starting NetScope demo server");

    let source = StaticInstanceSource::new()
        .with("greeter", Arc::new(Greeter))
        .with("calculator", Arc::new(Calculator))
        .with("counter", Arc::new(Counter::default()));
    let registry = CapabilityRegistry::new(demo_catalog()?, Arc::new(source))
        .with_naming(config.naming.strategy());

    info!("Endpoints:");
    info!("  - REST:   http://{}", config.rest.addr());
    info!("  - Docs:   http://{}{}", config.rest.addr(), config.rest.docs_path);
    if config.rpc.enabled {
        info!("  - RPC:    tcp://{}", config.rpc.addr());
    }

    let server = NetScopeServer::new(config, Arc::new(registry));
    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
