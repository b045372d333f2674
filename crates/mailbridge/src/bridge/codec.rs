//! Newline-delimited JSON codec for worker communication.
//!
//! Uses LinesCodec for framing + serde_json for serialization.
//! Works over any AsyncRead/AsyncWrite (pipes, sockets, etc).
//!
//! serde_json's compact output never contains a raw newline, leaves `/` and
//! non-ASCII characters unescaped and keeps `1.0` as `1.0`, so one value is
//! always exactly one line.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Longest line accepted from the peer (16 MiB).
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Codec that frames messages by newline and serializes with JSON.
///
/// A line that fails to parse is consumed before the error is returned, so
/// the next `decode` call resumes at the following line.
pub struct LineJsonCodec<T> {
    lines: LinesCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for LineJsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LineJsonCodec<T> {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            _phantom: PhantomData,
        }
    }
}

fn lines_error(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "line exceeds maximum length")
        }
    }
}

fn parse_line<T: DeserializeOwned>(line: &str) -> Result<T, io::Error> {
    serde_json::from_str(line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl<T: DeserializeOwned> Decoder for LineJsonCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode(src).map_err(lines_error)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return parse_line(&line).map(Some),
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode_eof(src).map_err(lines_error)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return parse_line(&line).map(Some),
                None => return Ok(None),
            }
        }
    }
}

impl<T: Serialize> Encoder<T> for LineJsonCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json =
            serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tracing::trace!(json_size_bytes = json.len(), "Encoding line");
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
