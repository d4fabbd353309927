// Type metadata table
// Hosts describe their service types once at startup: the class chain, the
// interfaces each type implements, and which operations and fields carry an
// exposure marker. The registry walks this table instead of reflecting on
// live objects.

use crate::coerce::TypeTag;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Qualified name of the universal root type every class implicitly extends.
pub const ROOT_TYPE: &str = "netscope::Object";

/// Namespaces whose types belong to the platform rather than the host.
pub const DEFAULT_PLATFORM_NAMESPACES: &[&str] = &["std", "core", "alloc", "netscope"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Root,
    Class,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureLevel {
    /// Callable without credentials.
    Public,
    /// Requires the per-operation key or the global key.
    Restricted,
}

/// Capability marker attached to an operation or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposure {
    pub level: ExposureLevel,
    pub path: Option<String>,
    pub http_method: HttpMethod,
    pub rest: bool,
    pub rpc: bool,
    pub key: Option<String>,
}

impl Exposure {
    pub fn public() -> Self {
        Exposure {
            level: ExposureLevel::Public,
            path: None,
            http_method: HttpMethod::Get,
            rest: true,
            rpc: true,
            key: None,
        }
    }

    pub fn restricted() -> Self {
        Exposure {
            level: ExposureLevel::Restricted,
            path: None,
            http_method: HttpMethod::Post,
            rest: true,
            rpc: true,
            key: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn http_method(mut self, method: HttpMethod) -> Self {
        self.http_method = method;
        self
    }

    pub fn rest(mut self, enabled: bool) -> Self {
        self.rest = enabled;
        self
    }

    pub fn rpc(mut self, enabled: bool) -> Self {
        self.rpc = enabled;
        self
    }

    /// Per-operation credential; only meaningful on restricted markers. An
    /// empty key defers to the global key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The per-operation key, with an empty key treated as absent.
    pub fn override_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn is_restricted(&self) -> bool {
        self.level == ExposureLevel::Restricted
    }

    fn validate(&self, owner: &str, member: &str) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidMarker {
            owner: owner.to_string(),
            member: member.to_string(),
            reason: reason.to_string(),
        };

        if self.level == ExposureLevel::Public && self.override_key().is_some() {
            return Err(invalid("public marker cannot carry a key"));
        }
        if let Some(path) = &self.path {
            if !path.starts_with('/') {
                return Err(invalid("custom path must start with '/'"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub type_tag: TypeTag,
}

/// An operation declared at one level of a type hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDecl {
    pub name: String,
    pub exposure: Option<Exposure>,
    pub parameters: Vec<ParamDecl>,
    pub returns: TypeTag,
    pub doc: Option<String>,
}

impl OperationDecl {
    pub fn new(name: impl Into<String>) -> Self {
        OperationDecl {
            name: name.into(),
            exposure: None,
            parameters: Vec::new(),
            returns: TypeTag::Void,
            doc: None,
        }
    }

    pub fn expose(mut self, exposure: Exposure) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn public(self) -> Self {
        self.expose(Exposure::public())
    }

    pub fn restricted(self) -> Self {
        self.expose(Exposure::restricted())
    }

    pub fn param(mut self, name: impl Into<String>, type_tag: TypeTag) -> Self {
        self.parameters.push(ParamDecl {
            name: name.into(),
            type_tag,
        });
        self
    }

    pub fn returns(mut self, type_tag: TypeTag) -> Self {
        self.returns = type_tag;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// A field declared on a class. Exposed fields become `get_<name>` and, when
/// writable, `set_<name>` capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub type_tag: TypeTag,
    pub exposure: Option<Exposure>,
    pub writable: bool,
    pub doc: Option<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        FieldDecl {
            name: name.into(),
            type_tag,
            exposure: None,
            writable: false,
            doc: None,
        }
    }

    pub fn expose(mut self, exposure: Exposure) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn read_member(&self) -> String {
        format!("get_{}", self.name)
    }

    pub fn write_member(&self) -> String {
        format!("set_{}", self.name)
    }
}

/// Metadata for one type in the host's hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub operations: Vec<OperationDecl>,
    pub fields: Vec<FieldDecl>,
    pub doc: Option<String>,
}

impl TypeInfo {
    fn with_kind(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        TypeInfo {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            superclass: None,
            interfaces: Vec::new(),
            operations: Vec::new(),
            fields: Vec::new(),
            doc: None,
        }
    }

    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(namespace, name, TypeKind::Class)
    }

    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(namespace, name, TypeKind::Interface)
    }

    pub fn root(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(namespace, name, TypeKind::Root)
    }

    /// Superclass by qualified name. Classes without one extend the root type.
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Implemented (for classes) or extended (for interfaces) interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn operation(mut self, operation: OperationDecl) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }

    pub fn simple_name(&self) -> &str {
        &self.name
    }
}

/// Misconfiguration of the metadata table. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Type registered twice: {0}")]
    DuplicateType(String),

    #[error("Type {referrer} refers to unregistered type {missing}")]
    UnknownType { referrer: String, missing: String },

    #[error("Type {referrer} extends {target}, which is not a class")]
    NotAClass { referrer: String, target: String },

    #[error("Type {referrer} implements {target}, which is not an interface")]
    NotAnInterface { referrer: String, target: String },

    #[error("Class hierarchy cycle through {0}")]
    HierarchyCycle(String),

    #[error("Interface {0} cannot declare a superclass or fields")]
    InvalidInterface(String),

    #[error("Invalid capability marker on {owner}.{member}: {reason}")]
    InvalidMarker {
        owner: String,
        member: String,
        reason: String,
    },
}

/// The metadata table, keyed by qualified type name.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    types: HashMap<String, TypeInfo>,
    platform_namespaces: Vec<String>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        let root = TypeInfo::root("netscope", "Object");
        let mut types = HashMap::new();
        types.insert(root.qualified_name(), root);
        TypeCatalog {
            types,
            platform_namespaces: DEFAULT_PLATFORM_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
        }
    }

    /// Treat `namespace` (and its sub-namespaces) as platform-owned.
    pub fn add_platform_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.platform_namespaces.push(namespace.into());
        self
    }

    pub fn register(&mut self, info: TypeInfo) -> Result<&mut Self, CatalogError> {
        let name = info.qualified_name();
        if self.types.contains_key(&name) {
            return Err(CatalogError::DuplicateType(name));
        }
        self.types.insert(name, info);
        Ok(self)
    }

    pub fn get(&self, qualified_name: &str) -> Option<&TypeInfo> {
        self.types.get(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether a qualified name lives in a platform namespace.
    pub fn is_platform(&self, qualified_name: &str) -> bool {
        self.platform_namespaces.iter().any(|ns| {
            qualified_name
                .strip_prefix(ns.as_str())
                .is_some_and(|rest| rest.starts_with("::"))
        })
    }

    /// Superclass chain of `info`, most-derived first, root type excluded.
    pub fn class_chain<'a>(&'a self, info: &'a TypeInfo) -> Result<Vec<&'a TypeInfo>, CatalogError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(info);

        while let Some(level) = current {
            if level.kind == TypeKind::Root {
                break;
            }
            let name = level.qualified_name();
            if !seen.insert(name.clone()) {
                return Err(CatalogError::HierarchyCycle(name));
            }
            chain.push(level);

            current = match &level.superclass {
                None => None,
                Some(parent) => {
                    let parent_info =
                        self.types
                            .get(parent)
                            .ok_or_else(|| CatalogError::UnknownType {
                                referrer: name.clone(),
                                missing: parent.clone(),
                            })?;
                    if parent_info.kind == TypeKind::Interface {
                        return Err(CatalogError::NotAClass {
                            referrer: name,
                            target: parent.clone(),
                        });
                    }
                    Some(parent_info)
                }
            };
        }

        Ok(chain)
    }

    /// Every user-defined interface reachable from `chain`, each visited once,
    /// in depth-first discovery order.
    pub fn interface_closure<'a>(
        &'a self,
        chain: &[&'a TypeInfo],
    ) -> Result<Vec<&'a TypeInfo>, CatalogError> {
        let mut visited = HashSet::new();
        let mut closure = Vec::new();
        for level in chain {
            for interface in &level.interfaces {
                self.visit_interface(level, interface, &mut visited, &mut closure)?;
            }
        }
        Ok(closure)
    }

    fn visit_interface<'a>(
        &'a self,
        referrer: &TypeInfo,
        name: &str,
        visited: &mut HashSet<String>,
        closure: &mut Vec<&'a TypeInfo>,
    ) -> Result<(), CatalogError> {
        if self.is_platform(name) || !visited.insert(name.to_string()) {
            return Ok(());
        }

        let info = self.types.get(name).ok_or_else(|| CatalogError::UnknownType {
            referrer: referrer.qualified_name(),
            missing: name.to_string(),
        })?;
        if info.kind != TypeKind::Interface {
            return Err(CatalogError::NotAnInterface {
                referrer: referrer.qualified_name(),
                target: name.to_string(),
            });
        }

        closure.push(info);
        for parent in &info.interfaces {
            self.visit_interface(info, parent, visited, closure)?;
        }
        Ok(())
    }

    /// Check every reference and marker in the table.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for info in self.types.values() {
            let owner = info.qualified_name();

            if info.kind == TypeKind::Interface
                && (info.superclass.is_some() || !info.fields.is_empty())
            {
                return Err(CatalogError::InvalidInterface(owner));
            }

            if info.kind == TypeKind::Class {
                let chain = self.class_chain(info)?;
                self.interface_closure(&chain)?;
            } else if info.kind == TypeKind::Interface {
                self.interface_closure(&[info])?;
            }

            for operation in &info.operations {
                if let Some(exposure) = &operation.exposure {
                    exposure.validate(&owner, &operation.name)?;
                }
            }
            for field in &info.fields {
                if let Some(exposure) = &field.exposure {
                    exposure.validate(&owner, &field.name)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}
