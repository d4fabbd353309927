// Operation Dispatcher
// Coerces a raw argument payload into the declared parameter types and calls
// the descriptor's operation on its owning instance. Stateless; one value can
// be shared by every transport.

use crate::coerce::{value_kind, CoercionError};
use crate::descriptor::{CapabilityDescriptor, OperationHandle};
use crate::error::{Fault, ServiceError};
use crate::service::Arguments;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{debug, error};

/// Encoding of an absent or void result.
pub const NULL_PAYLOAD: &str = "null";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid arguments: {0}")]
    Coercion(#[from] CoercionError),

    #[error("Instance {0} is no longer available")]
    InstanceUnavailable(String),

    #[error("{source}")]
    Invocation {
        operation: String,
        #[source]
        source: ServiceError,
    },

    #[error("Operation {operation} panicked: {message}")]
    Panicked { operation: String, message: String },

    #[error("Failed to serialize result: {0}")]
    Serialization(String),
}

impl From<DispatchError> for Fault {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Coercion(_) => Fault::coercion_failed(err.to_string()),
            DispatchError::Serialization(_) => Fault::internal(err.to_string()),
            DispatchError::InstanceUnavailable(_)
            | DispatchError::Invocation { .. }
            | DispatchError::Panicked { .. } => Fault::invocation_failed(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher
    }

    /// Turn a raw payload into one value per declared parameter.
    ///
    /// Operations without parameters ignore the payload entirely, even when it
    /// is malformed. A missing, blank or `null` payload yields zero values for
    /// every slot; so do positions past the end of the array and explicit
    /// nulls.
    pub fn coerce_arguments(
        &self,
        descriptor: &CapabilityDescriptor,
        raw: Option<&str>,
    ) -> Result<Arguments, CoercionError> {
        let parameters = descriptor.parameters();
        if parameters.is_empty() {
            return Ok(Arguments::empty());
        }

        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() || raw == NULL_PAYLOAD {
            return Ok(parameters
                .iter()
                .map(|p| p.type_tag.zero_value())
                .collect::<Vec<_>>()
                .into());
        }

        let decoded: Value = serde_json::from_str(raw)
            .map_err(|e| CoercionError::MalformedPayload(e.to_string()))?;
        let Value::Array(items) = decoded else {
            return Err(CoercionError::MalformedPayload(format!(
                "expected an array of arguments, found {}",
                value_kind(&decoded)
            )));
        };

        let mut values = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let value = match items.get(parameter.index) {
                Some(item) if !item.is_null() => {
                    parameter
                        .type_tag
                        .coerce(item)
                        .map_err(|mismatch| CoercionError::Mismatch {
                            index: parameter.index,
                            name: parameter.name.clone(),
                            mismatch,
                        })?
                }
                _ => parameter.type_tag.zero_value(),
            };
            values.push(value);
        }
        Ok(values.into())
    }

    /// Coerce `raw` and run the operation. Failures raised by the operation,
    /// including panics, come back as invocation errors.
    pub async fn invoke(
        &self,
        descriptor: &CapabilityDescriptor,
        raw: Option<&str>,
    ) -> Result<Value, DispatchError> {
        let args = self.coerce_arguments(descriptor, raw)?;
        let instance = descriptor
            .instance()
            .ok_or_else(|| DispatchError::InstanceUnavailable(descriptor.instance_name().to_string()))?;
        let operation = descriptor.qualified_name();

        debug!(capability = %operation, args = args.len(), "Dispatching operation");

        let call = async {
            match descriptor.handle() {
                OperationHandle::Method(name) => instance.call(name, args).await,
                OperationHandle::FieldRead(field) => instance.get_field(field).await,
                OperationHandle::FieldWrite(field) => {
                    let value = args.into_vec().into_iter().next().unwrap_or(Value::Null);
                    instance.set_field(field, value).await.map(|()| Value::Null)
                }
            }
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                error!(capability = %operation, error = %source, "Operation failed");
                Err(DispatchError::Invocation { operation, source })
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(capability = %operation, panic = %message, "Operation panicked");
                Err(DispatchError::Panicked { operation, message })
            }
        }
    }

    /// Encode a result for the wire. Absent results become `null`.
    pub fn serialize(&self, result: Option<&Value>) -> Result<String, DispatchError> {
        match result {
            None => Ok(NULL_PAYLOAD.to_string()),
            Some(value) => {
                serde_json::to_string(value).map_err(|e| DispatchError::Serialization(e.to_string()))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
