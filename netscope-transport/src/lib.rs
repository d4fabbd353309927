//! Wire envelopes and framing for the NetScope RPC transport.

pub mod codec;
pub mod envelope;

pub use codec::{ClientCodec, CodecError, FrameCodec, ServerCodec, DEFAULT_MAX_FRAME_SIZE};
pub use envelope::{
    DocsRequest, DocsResponse, GenericRequest, GenericResponse, MethodInfo, ParameterInfo, RpcCall,
    RpcReply,
};
