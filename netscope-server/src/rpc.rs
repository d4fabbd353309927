use crate::gateway::{Gateway, Target};
use futures::{future, Stream, StreamExt};
use netscope_core::{CapabilityDoc, Fault, Transport};
use netscope_transport::{
    DocsRequest, DocsResponse, GenericRequest, GenericResponse, MethodInfo, ParameterInfo,
};
use tracing::debug;

/// Unary, docs and client-streaming calls over RPC envelopes.
#[derive(Debug, Clone)]
pub struct RpcService {
    gateway: Gateway,
}

impl RpcService {
    pub fn new(gateway: Gateway) -> Self {
        RpcService { gateway }
    }

    pub async fn invoke_method(&self, request: GenericRequest) -> GenericResponse {
        let name = request.qualified_name();
        debug!(capability = %name, "RPC invoke");

        let payload = Some(request.arguments_json.as_str());
        match self
            .gateway
            .handle(Transport::Rpc, Target::Name(&name), request.credential(), payload)
            .await
        {
            Ok(result_json) => GenericResponse::ok(result_json),
            Err(fault) => fault_response(&fault),
        }
    }

    /// RPC-enabled capabilities.
    pub fn get_docs(&self, _request: DocsRequest) -> Result<DocsResponse, Fault> {
        let methods = self
            .gateway
            .docs(Transport::Rpc)?
            .into_iter()
            .map(method_info)
            .collect::<Vec<_>>();
        debug!(methods = methods.len(), "RPC docs");
        Ok(DocsResponse { methods })
    }

    /// One response per inbound request, in order. An inbound error is passed
    /// through and ends the output stream.
    pub fn invoke_method_stream<S, E>(
        &self,
        requests: S,
    ) -> impl Stream<Item = Result<GenericResponse, E>> + Send + 'static
    where
        S: Stream<Item = Result<GenericRequest, E>> + Send + 'static,
        E: Send + 'static,
    {
        let service = self.clone();
        requests
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                *failed = item.is_err();
                future::ready(Some(item))
            })
            .then(move |item| {
                let service = service.clone();
                async move {
                    match item {
                        Ok(request) => Ok(service.invoke_method(request).await),
                        Err(e) => Err(e),
                    }
                }
            })
    }
}

/// Invocation-layer faults get the `Invocation error: ` prefix; the rest
/// already carry their final message.
pub fn fault_response(fault: &Fault) -> GenericResponse {
    let status = fault.status_code();
    let message = if status == 500 {
        format!("Invocation error: {}", fault.message)
    } else {
        fault.message.clone()
    };
    GenericResponse::error(status, message)
}

fn method_info(doc: CapabilityDoc) -> MethodInfo {
    MethodInfo {
        type_name: doc.type_name,
        operation: doc.member,
        path: doc.path,
        restricted: doc.restricted,
        return_type: doc.return_type,
        parameters: doc
            .parameters
            .into_iter()
            .map(|p| ParameterInfo {
                name: p.name,
                type_name: p.type_name,
                index: u32::try_from(p.index).unwrap_or(u32::MAX),
            })
            .collect(),
    }
}
