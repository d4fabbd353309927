use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

use crate::envelope::{RpcCall, RpcReply};

/// Default upper bound on a single frame: 4 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Newline-delimited JSON framing. Decodes `D`, encodes `E`.
#[derive(Debug)]
pub struct FrameCodec<D, E> {
    max_frame_size: usize,
    /// Bytes already searched for a newline.
    next_index: usize,
    _types: PhantomData<fn() -> (D, E)>,
}

/// Codec for the server side of a connection.
pub type ServerCodec = FrameCodec<RpcCall, RpcReply>;

/// Codec for the client side of a connection.
pub type ClientCodec = FrameCodec<RpcReply, RpcCall>;

impl<D, E> FrameCodec<D, E> {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            next_index: 0,
            _types: PhantomData,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<D, E> Default for FrameCodec<D, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeserializeOwned, E> Decoder for FrameCodec<D, E> {
    type Item = D;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|&b| b == b'\n');

            let Some(offset) = newline else {
                if src.len() > self.max_frame_size {
                    return Err(CodecError::FrameTooLarge(src.len()));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let pos = self.next_index + offset;
            self.next_index = 0;
            if pos > self.max_frame_size {
                return Err(CodecError::FrameTooLarge(pos));
            }

            let line = src.split_to(pos);
            src.advance(1);

            let line = trim_frame(&line);
            if line.is_empty() {
                // Blank keep-alive line.
                continue;
            }
            return serde_json::from_slice(line)
                .map(Some)
                .map_err(|e| CodecError::Json(e.to_string()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        let rest = src.split();
        let rest = trim_frame(&rest);
        if rest.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(rest)
            .map(Some)
            .map_err(|e| CodecError::Json(e.to_string()))
    }
}

impl<D, E: Serialize> Encoder<E> for FrameCodec<D, E> {
    type Error = CodecError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json_bytes = serde_json::to_vec(&item).map_err(|e| CodecError::Json(e.to_string()))?;

        if json_bytes.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(json_bytes.len()));
        }

        dst.reserve(json_bytes.len() + 1);
        dst.put_slice(&json_bytes);
        dst.put_u8(b'\n');
        Ok(())
    }
}

fn trim_frame(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line.trim_ascii()
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
