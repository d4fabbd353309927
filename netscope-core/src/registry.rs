// Capability Registry
// Walks every registered instance's class chain and interface closure, turns
// marked operations and fields into descriptors, and publishes one immutable
// index. The scan runs at most once, on first use.

use crate::coerce::TypeTag;
use crate::descriptor::{CapabilityDescriptor, OperationHandle, ParameterInfo, TransportSet};
use crate::metadata::{CatalogError, Exposure, TypeCatalog, TypeInfo, TypeKind};
use crate::naming::{DefaultNamingStrategy, NamingStrategy};
use crate::service::{InstanceSource, ProxyUnwrapper, ServiceTarget, Unwrapper};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Startup-fatal registry failure. Per-instance resolution problems are not
/// errors; those instances are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Instance {instance} resolves to {type_name}, which is not a class")]
    NotAClass { instance: String, type_name: String },
}

/// Canonical, alias and path indices produced by one scan.
///
/// The index also holds every instance resolved during the scan, so
/// descriptors stay callable even when the source materializes a fresh
/// instance per `resolve`. It never constructs or destroys instances itself.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    canonical: IndexMap<String, Arc<CapabilityDescriptor>>,
    aliases: HashMap<String, Arc<CapabilityDescriptor>>,
    paths: HashMap<String, Arc<CapabilityDescriptor>>,
    instances: Vec<Arc<dyn ServiceTarget>>,
}

impl CapabilityIndex {
    /// Canonical descriptors in discovery order. Aliases never appear here.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CapabilityDescriptor>> {
        self.canonical.values()
    }

    /// Canonical `<OwnerType>.<member>` keys in discovery order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.canonical.keys().map(String::as_str)
    }

    /// Owned copies of the canonical descriptors, for callers that outlive
    /// the borrow.
    pub fn descriptors(&self) -> Vec<Arc<CapabilityDescriptor>> {
        self.canonical.values().cloned().collect()
    }

    /// Number of canonical capabilities. Aliases are not counted.
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Instances resolved during the scan and kept alive by this index.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Canonical entry first, then alias entry.
    pub fn get(&self, qualified_name: &str) -> Option<&Arc<CapabilityDescriptor>> {
        self.canonical
            .get(qualified_name)
            .or_else(|| self.aliases.get(qualified_name))
    }

    /// Exact match on the external path.
    pub fn get_by_path(&self, path: &str) -> Option<&Arc<CapabilityDescriptor>> {
        self.paths.get(path)
    }

    /// True for interface-qualified keys that only exist as aliases.
    pub fn is_alias(&self, qualified_name: &str) -> bool {
        !self.canonical.contains_key(qualified_name) && self.aliases.contains_key(qualified_name)
    }

    /// First write wins: declarations are offered most-derived first, so an
    /// occupied key means a more-derived declaration already claimed it.
    fn insert_if_absent(&mut self, key: String, descriptor: Arc<CapabilityDescriptor>) -> bool {
        match self.canonical.entry(key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(descriptor);
                true
            }
        }
    }

    /// First write wins: the first instance scanned owns an interface alias.
    fn insert_alias_if_absent(&mut self, key: String, descriptor: Arc<CapabilityDescriptor>) -> bool {
        if self.aliases.contains_key(&key) {
            return false;
        }
        self.aliases.insert(key, descriptor);
        true
    }

    fn insert_path_if_absent(&mut self, path: String, descriptor: Arc<CapabilityDescriptor>) -> bool {
        if self.paths.contains_key(&path) {
            return false;
        }
        self.paths.insert(path, descriptor);
        true
    }
}

struct InstanceContext<'a> {
    name: &'a str,
    concrete: &'a TypeInfo,
    instance: Weak<dyn ServiceTarget>,
}

struct Member {
    handle: OperationHandle,
    name: String,
    parameters: Vec<ParameterInfo>,
    return_type: TypeTag,
    doc: Option<String>,
    custom_path: Option<String>,
}

/// Lazily scanned, shareable capability registry.
pub struct CapabilityRegistry {
    catalog: Arc<TypeCatalog>,
    source: Arc<dyn InstanceSource>,
    naming: Arc<dyn NamingStrategy>,
    unwrapper: Arc<dyn Unwrapper>,
    index: OnceLock<Result<CapabilityIndex, RegistryError>>,
    scan_lock: Mutex<()>,
}

impl CapabilityRegistry {
    /// Registry over `catalog` and the instances `source` supplies, with the
    /// default naming strategy and proxy unwrapper. Nothing is scanned yet.
    pub fn new(catalog: TypeCatalog, source: Arc<dyn InstanceSource>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            source,
            naming: Arc::new(DefaultNamingStrategy::default()),
            unwrapper: Arc::new(ProxyUnwrapper),
            index: OnceLock::new(),
            scan_lock: Mutex::new(()),
        }
    }

    /// Replace the strategy that builds external paths.
    pub fn with_naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    /// Replace how an instance's true type is found behind proxies.
    pub fn with_unwrapper(mut self, unwrapper: impl Unwrapper + 'static) -> Self {
        self.unwrapper = Arc::new(unwrapper);
        self
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// True once a scan has completed successfully.
    pub fn is_scanned(&self) -> bool {
        matches!(self.index.get(), Some(Ok(_)))
    }

    /// Scan every registered instance if that has not happened yet and return
    /// the published index. Concurrent first callers block on a single scan.
    /// A failed scan is kept too; later calls return the same error without
    /// scanning again.
    pub fn scan(&self) -> Result<&CapabilityIndex, RegistryError> {
        if let Some(outcome) = self.index.get() {
            return outcome.as_ref().map_err(Clone::clone);
        }

        let _guard = self.scan_lock.lock();
        if let Some(outcome) = self.index.get() {
            return outcome.as_ref().map_err(Clone::clone);
        }

        let outcome = self.build_index();
        if let Err(e) = &outcome {
            error!(error = %e, "Capability scan failed");
        }
        self.index
            .get_or_init(|| outcome)
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Resolve `<TypeOrInterface>.<member>` against canonical keys, then aliases.
    pub fn lookup(
        &self,
        qualified_name: &str,
    ) -> Result<Option<Arc<CapabilityDescriptor>>, RegistryError> {
        Ok(self.scan()?.get(qualified_name).cloned())
    }

    /// Resolve an external path produced by the naming strategy or a marker.
    pub fn lookup_path(&self, path: &str) -> Result<Option<Arc<CapabilityDescriptor>>, RegistryError> {
        Ok(self.scan()?.get_by_path(path).cloned())
    }

    fn build_index(&self) -> Result<CapabilityIndex, RegistryError> {
        self.catalog.validate()?;

        let mut index = CapabilityIndex::default();
        let names = self.source.instance_names();
        let mut skipped = 0usize;

        for name in &names {
            let instance = match self.source.resolve(name) {
                Ok(instance) => instance,
                Err(e) => {
                    warn!(instance = %name, error = %e, "Skipping instance that could not be resolved");
                    skipped += 1;
                    continue;
                }
            };
            self.scan_instance(&mut index, name, &instance)?;
            index.instances.push(instance);
        }

        info!(
            instances = names.len(),
            skipped,
            capabilities = index.len(),
            aliases = index.alias_count(),
            "Capability scan complete"
        );
        Ok(index)
    }

    fn scan_instance(
        &self,
        index: &mut CapabilityIndex,
        instance_name: &str,
        instance: &Arc<dyn ServiceTarget>,
    ) -> Result<(), RegistryError> {
        let type_name = self.unwrapper.unwrap(instance.as_ref());
        let Some(concrete) = self.catalog.get(&type_name) else {
            debug!(instance = %instance_name, type_name = %type_name, "No metadata for instance type");
            return Ok(());
        };
        if concrete.kind != TypeKind::Class {
            return Err(RegistryError::NotAClass {
                instance: instance_name.to_string(),
                type_name,
            });
        }

        let chain = self.catalog.class_chain(concrete)?;
        let interfaces = self.catalog.interface_closure(&chain)?;
        let ctx = InstanceContext {
            name: instance_name,
            concrete,
            instance: Arc::downgrade(instance),
        };

        // Class chain most-derived first, then interface defaults.
        for level in chain.iter().chain(interfaces.iter()) {
            for operation in &level.operations {
                let Some(exposure) = &operation.exposure else {
                    continue;
                };
                let member = Member {
                    handle: OperationHandle::Method(operation.name.clone()),
                    name: operation.name.clone(),
                    parameters: operation
                        .parameters
                        .iter()
                        .enumerate()
                        .map(|(index, p)| ParameterInfo {
                            name: p.name.clone(),
                            type_tag: p.type_tag.clone(),
                            index,
                        })
                        .collect(),
                    return_type: operation.returns.clone(),
                    doc: operation.doc.clone(),
                    custom_path: exposure.path.clone(),
                };
                self.register(index, &ctx, level, exposure, member);
            }
        }

        for level in &chain {
            for field in &level.fields {
                let Some(exposure) = &field.exposure else {
                    continue;
                };
                let read = Member {
                    handle: OperationHandle::FieldRead(field.name.clone()),
                    name: field.read_member(),
                    parameters: Vec::new(),
                    return_type: field.type_tag.clone(),
                    doc: field.doc.clone(),
                    custom_path: exposure.path.clone(),
                };
                self.register(index, &ctx, level, exposure, read);

                if field.writable {
                    let write = Member {
                        handle: OperationHandle::FieldWrite(field.name.clone()),
                        name: field.write_member(),
                        parameters: vec![ParameterInfo {
                            name: "value".to_string(),
                            type_tag: field.type_tag.clone(),
                            index: 0,
                        }],
                        return_type: TypeTag::Void,
                        doc: field.doc.clone(),
                        custom_path: None,
                    };
                    self.register(index, &ctx, level, exposure, write);
                }
            }
        }

        self.register_aliases(index, concrete, &interfaces);
        Ok(())
    }

    fn register(
        &self,
        index: &mut CapabilityIndex,
        ctx: &InstanceContext<'_>,
        level: &TypeInfo,
        exposure: &Exposure,
        member: Member,
    ) {
        let owner = ctx.concrete.simple_name();
        let key = format!("{}.{}", owner, member.name);
        let path = member
            .custom_path
            .unwrap_or_else(|| self.naming.build_path(ctx.concrete, &member.name));

        let descriptor = Arc::new(CapabilityDescriptor {
            instance: ctx.instance.clone(),
            instance_name: ctx.name.to_string(),
            handle: member.handle,
            owner_type: owner.to_string(),
            declaring_type: level.simple_name().to_string(),
            member: member.name,
            path: path.clone(),
            http_method: exposure.http_method,
            restricted: exposure.is_restricted(),
            transports: TransportSet::new(exposure.rest, exposure.rpc),
            api_key: exposure.override_key().map(str::to_string),
            parameters: member.parameters,
            return_type: member.return_type,
            doc: member.doc,
        });

        if !index.insert_if_absent(key.clone(), Arc::clone(&descriptor)) {
            debug!(key = %key, declared_on = %level.simple_name(), "Declaration shadowed by a more-derived one");
            return;
        }

        if !index.insert_path_if_absent(path.clone(), Arc::clone(&descriptor)) {
            warn!(key = %key, path = %path, "Path already taken; capability reachable by name only");
        }

        info!(
            key = %key,
            path = %path,
            declared_on = %level.simple_name(),
            restricted = descriptor.is_restricted(),
            kind = ?descriptor.kind(),
            "Discovered capability"
        );
    }

    fn register_aliases(
        &self,
        index: &mut CapabilityIndex,
        concrete: &TypeInfo,
        interfaces: &[&TypeInfo],
    ) {
        let owner = concrete.simple_name();
        let prefix = format!("{}.", owner);
        let members: Vec<(String, Arc<CapabilityDescriptor>)> = index
            .canonical
            .iter()
            .filter_map(|(key, descriptor)| {
                key.strip_prefix(&prefix)
                    .map(|member| (member.to_string(), Arc::clone(descriptor)))
            })
            .collect();

        for interface in interfaces {
            let alias_owner = interface.simple_name();
            if alias_owner == owner {
                continue;
            }

            let mut added = 0usize;
            for (member, descriptor) in &members {
                let alias = format!("{}.{}", alias_owner, member);
                if index.insert_alias_if_absent(alias, Arc::clone(descriptor)) {
                    added += 1;
                }
            }

            if added > 0 {
                info!(
                    interface = %interface.qualified_name(),
                    owner = %owner,
                    aliases = added,
                    "Registered interface aliases"
                );
            }
        }
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("types", &self.catalog.len())
            .field("naming", &self.naming)
            .field("unwrapper", &self.unwrapper)
            .field("scanned", &self.is_scanned())
            .finish()
    }
}
