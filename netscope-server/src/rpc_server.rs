// TCP front end for RpcService
// Each connection carries newline-delimited RpcCall frames. Unary calls are
// answered concurrently and correlated by id; each client stream is served by
// its own task so messages within a stream are answered in order. Stream
// queues are bounded: a full queue stalls the frame reader until the stream
// task catches up.

use crate::rpc::RpcService;
use futures::channel::mpsc as stream_mpsc;
use futures::{SinkExt, StreamExt};
use netscope_transport::{
    CodecError, DocsRequest, GenericRequest, RpcCall, RpcReply, ServerCodec,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use uuid::Uuid;

const REPLY_BUFFER: usize = 64;
const STREAM_BUFFER: usize = 16;

type StreamSender = stream_mpsc::Sender<Result<GenericRequest, String>>;

#[derive(Debug, Clone)]
pub struct RpcServer {
    service: RpcService,
    max_frame_size: usize,
}

impl RpcServer {
    pub fn new(service: RpcService, max_frame_size: usize) -> Self {
        RpcServer {
            service,
            max_frame_size,
        }
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "RPC listener started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(%addr, "RPC listener shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept RPC connection");
                            continue;
                        }
                    };
                    let service = self.service.clone();
                    let max_frame_size = self.max_frame_size;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, Some(peer), service, max_frame_size).await {
                            warn!(%peer, error = %e, "RPC connection closed with error");
                        }
                    });
                }
            }
        }
    }
}

/// Serve one connection until the peer closes it or sends an undecodable frame.
pub async fn handle_connection<T>(
    io: T,
    peer: Option<SocketAddr>,
    service: RpcService,
    max_frame_size: usize,
) -> Result<(), CodecError>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let connection_id = Uuid::new_v4();
    info!(%connection_id, ?peer, "RPC connection opened");

    let framed = Framed::new(io, ServerCodec::with_max_frame_size(max_frame_size));
    let (mut sink, mut frames) = framed.split();
    let (replies, mut outbound) = mpsc::channel::<RpcReply>(REPLY_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(reply) = outbound.recv().await {
            sink.send(reply).await?;
        }
        Ok::<_, CodecError>(())
    });

    let mut streams: HashMap<u64, StreamSender> = HashMap::new();

    let result = loop {
        let call = match frames.next().await {
            None => break Ok(()),
            Some(Err(e)) => break Err(e),
            Some(Ok(call)) => call,
        };

        match call {
            RpcCall::Invoke { id, request } => {
                let service = service.clone();
                let replies = replies.clone();
                tokio::spawn(async move {
                    let response = service.invoke_method(request).await;
                    let _ = replies.send(RpcReply::Response { id, response }).await;
                });
            }
            RpcCall::Docs { id } => {
                let reply = match service.get_docs(DocsRequest {}) {
                    Ok(response) => RpcReply::Docs { id, response },
                    Err(fault) => RpcReply::Error {
                        id,
                        status_code: fault.status_code(),
                        message: fault.message,
                    },
                };
                if replies.send(reply).await.is_err() {
                    break Ok(());
                }
            }
            RpcCall::Stream { stream, request } => {
                let sender = streams
                    .entry(stream)
                    .or_insert_with(|| open_stream(stream, &service, &replies));
                if sender.send(Ok(request)).await.is_err() {
                    streams.remove(&stream);
                }
            }
            RpcCall::EndStream { stream } => {
                if streams.remove(&stream).is_none() {
                    // Ending a stream that never sent anything.
                    let _ = replies.send(RpcReply::StreamEnd { stream }).await;
                }
            }
        }
    };

    if let Err(e) = &result {
        for sender in streams.values_mut() {
            let _ = sender.send(Err(e.to_string())).await;
        }
    }
    drop(streams);
    drop(replies);

    // Pending replies are flushed before the connection is torn down.
    match writer.await {
        Ok(Err(e)) => warn!(%connection_id, error = %e, "Failed to write RPC reply"),
        Err(e) => warn!(%connection_id, error = %e, "RPC writer task failed"),
        Ok(Ok(())) => {}
    }

    info!(%connection_id, "RPC connection closed");
    result
}

fn open_stream(stream: u64, service: &RpcService, replies: &mpsc::Sender<RpcReply>) -> StreamSender {
    debug!(stream, "Client stream opened");
    let (sender, receiver) = stream_mpsc::channel(STREAM_BUFFER);
    let responses = service.invoke_method_stream(receiver);
    let replies = replies.clone();

    tokio::spawn(async move {
        let mut responses = std::pin::pin!(responses);
        while let Some(item) = responses.next().await {
            match item {
                Ok(response) => {
                    if replies.send(RpcReply::StreamItem { stream, response }).await.is_err() {
                        return;
                    }
                }
                Err(reason) => {
                    warn!(stream, %reason, "Client stream aborted");
                    return;
                }
            }
        }
        debug!(stream, "Client stream completed");
        let _ = replies.send(RpcReply::StreamEnd { stream }).await;
    });

    sender
}
