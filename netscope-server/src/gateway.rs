// Adapter pipeline shared by the REST and RPC transports:
// resolve -> transport check -> auth -> dispatch -> serialize.

use netscope_core::{
    export_docs, AuthGate, CapabilityDescriptor, CapabilityDoc, CapabilityRegistry, Dispatcher,
    Fault, SecurityConfig, Transport,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// How a caller names the capability it wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// `<TypeOrInterface>.<member>`
    Name(&'a str),
    /// External path from the naming strategy or a marker.
    Path(&'a str),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => write!(f, "{}", name),
            Target::Path(path) => write!(f, "{}", path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gateway {
    registry: Arc<CapabilityRegistry>,
    dispatcher: Dispatcher,
    auth: AuthGate,
}

impl Gateway {
    pub fn new(registry: Arc<CapabilityRegistry>, security: SecurityConfig) -> Self {
        Gateway {
            registry,
            dispatcher: Dispatcher::new(),
            auth: AuthGate::new(security),
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Number of canonical capabilities, scanning if needed.
    pub fn capability_count(&self) -> Result<usize, Fault> {
        self.registry
            .scan()
            .map(|index| index.len())
            .map_err(|e| internal(&e))
    }

    pub fn resolve(&self, target: Target<'_>) -> Result<Arc<CapabilityDescriptor>, Fault> {
        let found = match target {
            Target::Name(name) => self.registry.lookup(name),
            Target::Path(path) => self.registry.lookup_path(path),
        }
        .map_err(|e| internal(&e))?;

        found.ok_or_else(|| Fault::not_found(format!("Method not found: {}", target)))
    }

    /// Run one call through the full pipeline and return the encoded result.
    #[tracing::instrument(skip(self, credential, payload), fields(transport = %transport))]
    pub async fn handle(
        &self,
        transport: Transport,
        target: Target<'_>,
        credential: Option<&str>,
        payload: Option<&str>,
    ) -> Result<String, Fault> {
        let descriptor = self.resolve(target)?;

        if !descriptor.enabled_for(transport) {
            debug!(capability = %descriptor.qualified_name(), "Transport not enabled");
            return Err(Fault::transport_disabled(format!(
                "{} access not enabled for this method",
                transport
            )));
        }

        if !self.auth.validate(&descriptor, credential).is_allowed() {
            warn!(capability = %descriptor.qualified_name(), "Authentication failed");
            return Err(Fault::unauthorized(format!(
                "Authentication failed. {}",
                self.auth.hint(&descriptor)
            )));
        }

        let result = self.dispatcher.invoke(&descriptor, payload).await?;
        Ok(self.dispatcher.serialize(Some(&result))?)
    }

    pub fn docs(&self, transport: Transport) -> Result<Vec<CapabilityDoc>, Fault> {
        export_docs(&self.registry, transport).map_err(|e| internal(&e))
    }
}

fn internal(err: &netscope_core::RegistryError) -> Fault {
    error!(error = %err, "Capability registry is misconfigured");
    Fault::internal(err.to_string())
}
