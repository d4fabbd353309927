use crate::descriptor::{CapabilityDescriptor, OperationKind, Transport};
use crate::metadata::HttpMethod;
use crate::registry::{CapabilityRegistry, RegistryError};
use serde::{Deserialize, Serialize};

/// Documentation projection of a descriptor. Carries no instance reference,
/// handle or key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDoc {
    pub type_name: String,
    pub member: String,
    pub qualified_name: String,
    pub path: String,
    pub http_method: HttpMethod,
    pub kind: OperationKind,
    pub restricted: bool,
    pub parameters: Vec<ParameterDoc>,
    pub return_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub transports: Vec<Transport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub index: usize,
}

impl From<&CapabilityDescriptor> for CapabilityDoc {
    fn from(descriptor: &CapabilityDescriptor) -> Self {
        CapabilityDoc {
            type_name: descriptor.owner_type().to_string(),
            member: descriptor.member().to_string(),
            qualified_name: descriptor.qualified_name(),
            path: descriptor.path().to_string(),
            http_method: descriptor.http_method(),
            kind: descriptor.kind(),
            restricted: descriptor.is_restricted(),
            parameters: descriptor
                .parameters()
                .iter()
                .map(|p| ParameterDoc {
                    name: p.name.clone(),
                    type_name: p.type_tag.to_string(),
                    index: p.index,
                })
                .collect(),
            return_type: descriptor.return_type().to_string(),
            doc: descriptor.doc().map(str::to_string),
            transports: descriptor.transports().iter().collect(),
        }
    }
}

/// Canonical capabilities reachable through `transport`, in discovery order.
pub fn export_docs(
    registry: &CapabilityRegistry,
    transport: Transport,
) -> Result<Vec<CapabilityDoc>, RegistryError> {
    Ok(registry
        .scan()?
        .iter()
        .filter(|d| d.enabled_for(transport))
        .map(|d| CapabilityDoc::from(d.as_ref()))
        .collect())
}
