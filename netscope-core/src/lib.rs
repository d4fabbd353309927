//! Capability discovery and dispatch for NetScope.
//!
//! Hosts describe their service types in a [`TypeCatalog`] and hand live
//! instances to a [`CapabilityRegistry`]. The registry discovers every
//! operation or field carrying an [`Exposure`] marker, the [`Dispatcher`]
//! coerces wire arguments and calls them, and the [`AuthGate`] decides whether
//! a caller may.

pub mod auth;
pub mod coerce;
pub mod descriptor;
pub mod dispatcher;
pub mod docs;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod registry;
pub mod service;

pub use auth::{AuthDecision, AuthGate, SecurityConfig};
pub use coerce::{CoercionError, TypeMismatch, TypeTag};
pub use descriptor::{
    CapabilityDescriptor, OperationHandle, OperationKind, ParameterInfo, Transport, TransportSet,
};
pub use dispatcher::{DispatchError, Dispatcher, NULL_PAYLOAD};
pub use docs::{export_docs, CapabilityDoc, ParameterDoc};
pub use error::{Fault, FaultCode, ServiceError};
pub use metadata::{
    CatalogError, Exposure, ExposureLevel, FieldDecl, HttpMethod, OperationDecl, ParamDecl,
    TypeCatalog, TypeInfo, TypeKind, ROOT_TYPE,
};
pub use naming::{DefaultNamingStrategy, KebabCaseNamingStrategy, NamingStrategy};
pub use registry::{CapabilityIndex, CapabilityRegistry, RegistryError};
pub use service::{
    Arguments, InstanceSource, ProxyUnwrapper, ResolveError, ServiceTarget, StaticInstanceSource,
    Unwrapper,
};
