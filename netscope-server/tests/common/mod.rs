#![allow(dead_code)]

use async_trait::async_trait;
use netscope_core::{
    Arguments, CapabilityRegistry, Exposure, OperationDecl, SecurityConfig, ServiceError,
    ServiceTarget, StaticInstanceSource, TypeCatalog, TypeInfo, TypeTag,
};
use netscope_server::Gateway;
use serde_json::{json, Value};
use std::sync::Arc;

pub const GLOBAL_KEY: &str = "global-key";
pub const VAULT_KEY: &str = "vault-key";

pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::interface("app", "Greets")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String)),
        )
        .unwrap()
        .register(
            TypeInfo::class("app", "BaseGreeter")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String))
                .operation(OperationDecl::new("farewell").restricted().returns(TypeTag::String)),
        )
        .unwrap()
        .register(
            TypeInfo::class("app", "Greeter")
                .extends("app::BaseGreeter")
                .implements("app::Greets")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String))
                .operation(
                    OperationDecl::new("greet")
                        .public()
                        .param("name", TypeTag::String)
                        .param("times", TypeTag::Int)
                        .returns(TypeTag::String),
                )
                .operation(
                    OperationDecl::new("vault")
                        .expose(Exposure::restricted().key(VAULT_KEY))
                        .returns(TypeTag::String),
                )
                .operation(
                    OperationDecl::new("rpc_only")
                        .expose(Exposure::public().rest(false))
                        .returns(TypeTag::String),
                )
                .operation(
                    OperationDecl::new("rest_only")
                        .expose(Exposure::public().rpc(false))
                        .returns(TypeTag::String),
                )
                .operation(OperationDecl::new("fail").public()),
        )
        .unwrap();
    catalog
}

#[derive(Debug)]
pub struct Greeter;

#[async_trait]
impl ServiceTarget for Greeter {
    fn type_name(&self) -> &str {
        "app::Greeter"
    }

    async fn call(&self, operation: &str, args: Arguments) -> Result<Value, ServiceError> {
        match operation {
            "hello" => Ok(json!("Hello from Greeter")),
            "greet" => {
                let name: Option<String> = args.get(0)?;
                let times: i64 = args.get(1)?;
                let name = name.unwrap_or_else(|| "stranger".to_string());
                let greeting = format!("Hello, {}!", name);
                Ok(json!(greeting.repeat(times.max(1) as usize)))
            }
            "vault" => Ok(json!("opened")),
            "farewell" => Ok(json!("Goodbye")),
            "rpc_only" => Ok(json!("rpc")),
            "rest_only" => Ok(json!("rest")),
            "fail" => Err(ServiceError::failed("boom")),
            other => Err(ServiceError::UnknownOperation(other.to_string())),
        }
    }
}

pub fn registry() -> Arc<CapabilityRegistry> {
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter));
    Arc::new(CapabilityRegistry::new(catalog(), Arc::new(source)))
}

pub fn security() -> SecurityConfig {
    SecurityConfig {
        enabled: true,
        api_key: Some(GLOBAL_KEY.to_string()),
    }
}

pub fn gateway() -> Gateway {
    Gateway::new(registry(), security())
}

/// A registry whose catalog references a missing superclass.
pub fn broken_registry() -> Arc<CapabilityRegistry> {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(TypeInfo::class("app", "Greeter").extends("app::Missing"))
        .unwrap();
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter));
    Arc::new(CapabilityRegistry::new(catalog, Arc::new(source)))
}

pub fn broken_gateway() -> Gateway {
    Gateway::new(broken_registry(), security())
}
