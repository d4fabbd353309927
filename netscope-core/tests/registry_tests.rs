mod common;

use common::*;
use netscope_core::{
    CapabilityRegistry, CatalogError, KebabCaseNamingStrategy, OperationDecl, OperationKind,
    RegistryError, StaticInstanceSource, TypeCatalog, TypeInfo, TypeTag, ROOT_TYPE,
};
use std::sync::Arc;

fn greeter_registry() -> CapabilityRegistry {
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    CapabilityRegistry::new(greeter_catalog(), Arc::new(source))
}

#[test]
fn test_scan_discovers_in_precedence_order() {
    let registry = greeter_registry();
    let index = registry.scan().unwrap();
    let keys: Vec<&str> = index.keys().collect();
    assert_eq!(keys, GREETER_KEYS);
}

#[test]
fn test_most_derived_declaration_wins() {
    let registry = greeter_registry();
    let index = registry.scan().unwrap();

    let hello: Vec<_> = index
        .iter()
        .filter(|d| d.qualified_name() == "Greeter.hello")
        .collect();
    assert_eq!(hello.len(), 1);
    assert_eq!(hello[0].declaring_type(), "Greeter");
    assert_eq!(hello[0].doc(), Some("derived greeting"));

    let farewell = registry.lookup("Greeter.farewell").unwrap().unwrap();
    assert_eq!(farewell.declaring_type(), "BaseGreeter");
    assert!(farewell.is_restricted());

    let wave = registry.lookup("Greeter.wave").unwrap().unwrap();
    assert_eq!(wave.declaring_type(), "Greets");
}

#[test]
fn test_unmarked_operations_are_not_exposed() {
    let registry = greeter_registry();
    assert!(registry.lookup("Greeter.internal").unwrap().is_none());
    assert!(registry.lookup("BaseGreeter.internal").unwrap().is_none());
}

#[test]
fn test_interface_alias_is_same_descriptor() {
    let registry = greeter_registry();
    for key in GREETER_KEYS {
        let member = key.trim_start_matches("Greeter.");
        let canonical = registry.lookup(key).unwrap().unwrap();
        for interface in ["Greets", "Named"] {
            let alias = registry
                .lookup(&format!("{}.{}", interface, member))
                .unwrap()
                .unwrap();
            assert!(Arc::ptr_eq(&canonical, &alias), "{}.{}", interface, member);
        }
    }
    // Superclasses are not interfaces and get no alias.
    assert!(registry.lookup("BaseGreeter.hello").unwrap().is_none());
}

#[test]
fn test_scan_contains_only_canonical_keys() {
    let registry = greeter_registry();
    let index = registry.scan().unwrap();
    assert_eq!(index.alias_count(), GREETER_KEYS.len() * 2);
    for descriptor in index.iter() {
        assert!(descriptor.qualified_name().starts_with("Greeter."));
        assert!(!index.is_alias(&descriptor.qualified_name()));
    }
    assert!(index.is_alias("Greets.hello"));
}

#[test]
fn test_diamond_interface_visited_once() {
    // Named is reachable through Greets and through BaseGreeter.
    let registry = greeter_registry();
    let index = registry.scan().unwrap();
    let names = index
        .iter()
        .filter(|d| d.member() == "name")
        .count();
    assert_eq!(names, 1);
}

#[test]
fn test_platform_interfaces_and_root_are_skipped() {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::interface("std", "Display")
                .operation(OperationDecl::new("fmt").public().returns(TypeTag::String)),
        )
        .unwrap()
        .register(
            TypeInfo::class("app", "Greeter")
                .extends(ROOT_TYPE)
                .implements("std::Display")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String)),
        )
        .unwrap();
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let registry = CapabilityRegistry::new(catalog, Arc::new(source));

    let index = registry.scan().unwrap();
    assert_eq!(index.keys().collect::<Vec<_>>(), vec!["Greeter.hello"]);
    assert_eq!(index.alias_count(), 0);
    assert!(registry.lookup("Display.fmt").unwrap().is_none());
    assert!(registry.lookup("Object.hello").unwrap().is_none());
}

#[test]
fn test_interface_with_same_simple_name_gets_no_alias() {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::interface("api", "Greeter")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String)),
        )
        .unwrap()
        .register(TypeInfo::class("app", "Greeter").implements("api::Greeter"))
        .unwrap();
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let registry = CapabilityRegistry::new(catalog, Arc::new(source));

    let index = registry.scan().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index.alias_count(), 0);
    assert!(!index.is_alias("Greeter.hello"));
    assert_eq!(
        registry.lookup("Greeter.hello").unwrap().unwrap().declaring_type(),
        "Greeter"
    );
}

#[test]
fn test_first_instance_owns_interface_alias() {
    let mut catalog = greeter_catalog();
    catalog
        .register(
            TypeInfo::class("app", "LoudGreeter")
                .implements("app::Greets")
                .operation(OperationDecl::new("hello").public().returns(TypeTag::String)),
        )
        .unwrap();

    let source = StaticInstanceSource::new()
        .with("greeter", Arc::new(Greeter::new()))
        .with("loud", Arc::new(LoudGreeter));
    let registry = CapabilityRegistry::new(catalog, Arc::new(source));

    let alias = registry.lookup("Greets.hello").unwrap().unwrap();
    assert_eq!(alias.owner_type(), "Greeter");
    assert_eq!(alias.instance_name(), "greeter");

    let loud = registry.lookup("LoudGreeter.hello").unwrap().unwrap();
    assert_eq!(loud.instance_name(), "loud");
}

#[test]
fn test_unresolvable_instance_is_skipped() {
    let inner = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let source = FlakySource::new(inner, &["broken"]);
    let registry = CapabilityRegistry::new(greeter_catalog(), Arc::new(source));

    let index = registry.scan().unwrap();
    assert_eq!(index.len(), GREETER_KEYS.len());
}

#[test]
fn test_instance_without_metadata_exposes_nothing() {
    let source = StaticInstanceSource::new()
        .with("recorder", Arc::new(Recorder::new()))
        .with("greeter", Arc::new(Greeter::new()));
    let registry = CapabilityRegistry::new(greeter_catalog(), Arc::new(source));
    assert_eq!(registry.scan().unwrap().len(), GREETER_KEYS.len());
}

#[test]
fn test_proxy_is_unwrapped_to_real_type() {
    let proxy = Traced {
        inner: Greeter::new(),
    };
    let source = StaticInstanceSource::new().with("greeter", Arc::new(proxy));
    let registry = CapabilityRegistry::new(greeter_catalog(), Arc::new(source));

    let hello = registry.lookup("Greeter.hello").unwrap().unwrap();
    assert_eq!(hello.owner_type(), "Greeter");
    assert_eq!(hello.instance().unwrap().type_name(), "proxy::Traced");
}

#[test]
fn test_concurrent_first_scan_runs_once() {
    let inner = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let source = Arc::new(CountingSource::new(inner));
    let registry = Arc::new(CapabilityRegistry::new(greeter_catalog(), source.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let index = registry.scan().unwrap();
                (index as *const _ as usize, index.len())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = results[0];
    assert!(results.iter().all(|r| *r == first));
    assert_eq!(first.1, GREETER_KEYS.len());
    assert_eq!(source.listings(), 1);

    registry.scan().unwrap();
    registry.lookup("Greeter.hello").unwrap();
    assert_eq!(source.listings(), 1);
}

#[test]
fn test_scan_is_lazy() {
    let inner = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let source = Arc::new(CountingSource::new(inner));
    let registry = CapabilityRegistry::new(greeter_catalog(), source.clone());

    assert!(!registry.is_scanned());
    assert_eq!(source.listings(), 0);
    registry.lookup("Greets.hello").unwrap();
    assert!(registry.is_scanned());
    assert_eq!(source.listings(), 1);
}

#[test]
fn test_misconfigured_catalog_is_fatal() {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(TypeInfo::class("app", "Greeter").extends("app::Missing"))
        .unwrap();
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let registry = CapabilityRegistry::new(catalog, Arc::new(source));

    let err = registry.scan().unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Catalog(CatalogError::UnknownType { .. })
    ));
    assert!(!registry.is_scanned());
    assert!(registry.lookup("Greeter.hello").is_err());
}

#[test]
fn test_instance_of_interface_type_is_fatal() {
    let mut catalog = TypeCatalog::new();
    catalog.register(TypeInfo::interface("app", "Greeter")).unwrap();
    let inner = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let source = Arc::new(CountingSource::new(inner));
    let registry = CapabilityRegistry::new(catalog, source.clone());

    let first = registry.scan().unwrap_err();
    assert!(matches!(first, RegistryError::NotAClass { .. }));

    // The failure is remembered; instances are not walked again.
    assert_eq!(registry.scan().unwrap_err(), first);
    assert!(registry.lookup("Greeter.hello").is_err());
    assert!(registry.lookup_path("/netscope/Greeter/hello").is_err());
    assert_eq!(source.listings(), 1);
    assert!(!registry.is_scanned());
}

#[test]
fn test_path_index() {
    let registry = greeter_registry();
    let hello = registry.lookup_path("/netscope/Greeter/hello").unwrap().unwrap();
    assert_eq!(hello.qualified_name(), "Greeter.hello");
    assert!(registry.lookup_path("/netscope/Greets/hello").unwrap().is_none());
}

#[test]
fn test_custom_naming_strategy() {
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let registry = CapabilityRegistry::new(greeter_catalog(), Arc::new(source))
        .with_naming(KebabCaseNamingStrategy::new("api").with_version("v1"));

    let greet = registry.lookup("Greeter.greet").unwrap().unwrap();
    assert_eq!(greet.path(), "/api/v1/greeter/greet");
    assert!(registry.lookup_path("/api/v1/greeter/farewell").unwrap().is_some());
}

#[test]
fn test_custom_path_marker() {
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            TypeInfo::class("app", "Greeter").operation(
                OperationDecl::new("hello")
                    .expose(netscope_core::Exposure::public().path("/hi")),
            ),
        )
        .unwrap();
    let source = StaticInstanceSource::new().with("greeter", Arc::new(Greeter::new()));
    let registry = CapabilityRegistry::new(catalog, Arc::new(source));

    let hello = registry.lookup_path("/hi").unwrap().unwrap();
    assert_eq!(hello.qualified_name(), "Greeter.hello");
    assert!(registry.lookup_path("/netscope/Greeter/hello").unwrap().is_none());
}

#[test]
fn test_exposed_fields_become_accessors() {
    let source = StaticInstanceSource::new().with("recorder", Arc::new(Recorder::new()));
    let registry = CapabilityRegistry::new(recorder_catalog(), Arc::new(source));

    let read = registry.lookup("Recorder.get_level").unwrap().unwrap();
    assert_eq!(read.kind(), OperationKind::FieldRead);
    assert!(read.parameters().is_empty());

    let write = registry.lookup("Recorder.set_level").unwrap().unwrap();
    assert_eq!(write.kind(), OperationKind::FieldWrite);
    assert_eq!(write.parameters().len(), 1);
    assert_eq!(write.parameters()[0].type_tag, TypeTag::Int);

    assert!(registry.lookup("Recorder.get_serial").unwrap().is_some());
    assert!(registry.lookup("Recorder.set_serial").unwrap().is_none());
    assert!(registry.lookup("Recorder.get_secret").unwrap().is_none());
}

#[derive(Debug)]
struct LoudGreeter;

#[async_trait::async_trait]
impl netscope_core::ServiceTarget for LoudGreeter {
    fn type_name(&self) -> &str {
        "app::LoudGreeter"
    }

    async fn call(
        &self,
        _operation: &str,
        _args: netscope_core::Arguments,
    ) -> Result<serde_json::Value, netscope_core::ServiceError> {
        Ok(serde_json::json!("HELLO"))
    }
}
