//! Newline-delimited JSON.
//!
//! The engine separates documents with `\n` or `\r\n`, and some endpoints
//! write several documents into one chunk with no separator at all. The
//! decoder accepts both.

use bytes::{Buf, BytesMut};
use dockwire_error::{Error, Result};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::codec::Decoder;

/// Decodes a stream of JSON documents into `T`.
pub struct JsonLinesCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonLinesCodec<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonLinesCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonLinesCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonLinesCodec")
    }
}

impl<T: DeserializeOwned> Decoder for JsonLinesCodec<T> {
    type Item = T;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>> {
        let (next, consumed) = {
            let mut docs = serde_json::Deserializer::from_slice(src).into_iter::<T>();
            let next = docs.next();
            (next, docs.byte_offset())
        };
        match next {
            Some(Ok(doc)) => {
                src.advance(consumed);
                Ok(Some(doc))
            }
            // Incomplete document; wait for more bytes.
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e.into()),
            None => {
                // Only whitespace left.
                src.clear();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<T>> {
        if let Some(doc) = self.decode(src)? {
            return Ok(Some(doc));
        }
        if src.iter().all(u8::is_ascii_whitespace) {
            src.clear();
            return Ok(None);
        }
        let doc = serde_json::from_slice(src)?;
        src.clear();
        Ok(Some(doc))
    }
}
