use crate::coerce::TypeTag;
use crate::metadata::HttpMethod;
use crate::service::ServiceTarget;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// The transports a capability can be reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Request/response HTTP.
    Rest,
    /// RPC envelopes, unary or client streaming.
    Rpc,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Rest => write!(f, "REST"),
            Transport::Rpc => write!(f, "RPC"),
        }
    }
}

/// Transports a capability is enabled for. Both by default on a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportSet {
    rest: bool,
    rpc: bool,
}

impl TransportSet {
    pub fn new(rest: bool, rpc: bool) -> Self {
        TransportSet { rest, rpc }
    }

    /// REST and RPC.
    pub fn all() -> Self {
        Self::new(true, true)
    }

    pub fn contains(&self, transport: Transport) -> bool {
        match transport {
            Transport::Rest => self.rest,
            Transport::Rpc => self.rpc,
        }
    }

    /// Enabled transports, REST first.
    pub fn iter(&self) -> impl Iterator<Item = Transport> + '_ {
        [Transport::Rest, Transport::Rpc]
            .into_iter()
            .filter(|t| self.contains(*t))
    }
}

/// Whether a capability is an operation or one side of a field accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Method,
    FieldRead,
    FieldWrite,
}

/// What the dispatcher actually touches on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationHandle {
    Method(String),
    FieldRead(String),
    FieldWrite(String),
}

impl OperationHandle {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationHandle::Method(_) => OperationKind::Method,
            OperationHandle::FieldRead(_) => OperationKind::FieldRead,
            OperationHandle::FieldWrite(_) => OperationKind::FieldWrite,
        }
    }

    /// Underlying operation or field name on the instance.
    pub fn target(&self) -> &str {
        match self {
            OperationHandle::Method(name)
            | OperationHandle::FieldRead(name)
            | OperationHandle::FieldWrite(name) => name,
        }
    }
}

/// One declared parameter; `index` is its position in the argument array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub type_tag: TypeTag,
    pub index: usize,
}

/// Immutable metadata for one discovered capability.
///
/// The instance reference is non-owning. The index that published the
/// descriptor keeps the instance alive; once the registry is dropped the
/// descriptor can no longer be invoked.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    pub(crate) instance: Weak<dyn ServiceTarget>,
    pub(crate) instance_name: String,
    pub(crate) handle: OperationHandle,
    pub(crate) owner_type: String,
    pub(crate) declaring_type: String,
    pub(crate) member: String,
    pub(crate) path: String,
    pub(crate) http_method: HttpMethod,
    pub(crate) restricted: bool,
    pub(crate) transports: TransportSet,
    pub(crate) api_key: Option<String>,
    pub(crate) parameters: Vec<ParameterInfo>,
    pub(crate) return_type: TypeTag,
    pub(crate) doc: Option<String>,
}

impl CapabilityDescriptor {
    /// Canonical index key: `<OwnerType>.<member>`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner_type, self.member)
    }

    /// The owning instance, if it is still alive.
    pub fn instance(&self) -> Option<Arc<dyn ServiceTarget>> {
        self.instance.upgrade()
    }

    /// Name the instance source registered the instance under.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn kind(&self) -> OperationKind {
        self.handle.kind()
    }

    /// Simple name of the concrete type the capability was discovered on.
    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Simple name of the type whose declaration won precedence.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// External path from a custom marker path or the naming strategy.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn transports(&self) -> TransportSet {
        self.transports
    }

    pub fn enabled_for(&self, transport: Transport) -> bool {
        self.transports.contains(transport)
    }

    /// Per-operation credential override, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Declared parameters in positional order.
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn return_type(&self) -> &TypeTag {
        &self.return_type
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

// The per-operation key is deliberately left out.
impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("qualified_name", &self.qualified_name())
            .field("instance_name", &self.instance_name)
            .field("handle", &self.handle)
            .field("declaring_type", &self.declaring_type)
            .field("path", &self.path)
            .field("restricted", &self.restricted)
            .field("transports", &self.transports)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
