//! Stream decoding for credential files
//!
//! Collects a chunked byte source into one buffer, decodes it as UTF-8, and
//! parses it as JSON. The chunks are concatenated as raw bytes before
//! decoding, so a multi-byte character split across two chunks is fine.
//!
//! An absent source still fails asynchronously: the decoder yields to the
//! scheduler once before returning `MissingInput`, so the error is never
//! produced on the first poll.

use std::io;

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Drain `stream` and parse the concatenated chunks as JSON.
///
/// A read error from the stream ends decoding with `Error::Io`. The first
/// error is the only one reported; no further chunks are read.
pub async fn decode_stream<S, B>(stream: Option<S>) -> Result<Value>
where
    S: Stream<Item = io::Result<B>>,
    B: AsRef<[u8]>,
{
    let Some(stream) = stream else {
        return missing_input().await;
    };
    let mut stream = std::pin::pin!(stream);

    let mut buffer = Vec::new();
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Io(format!("reading credential stream: {e}")))?;
        buffer.extend_from_slice(chunk.as_ref());
        chunks += 1;
    }
    debug!(chunks, bytes = buffer.len(), "credential stream ended");

    parse_buffer(buffer)
}

/// Read `reader` to the end and parse its contents as JSON.
pub async fn decode_reader<R>(reader: Option<R>) -> Result<Value>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return missing_input().await;
    };

    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .await
        .map_err(|e| Error::Io(format!("reading credential source: {e}")))?;
    debug!(bytes = buffer.len(), "credential source ended");

    parse_buffer(buffer)
}

async fn missing_input<T>() -> Result<T> {
    tokio::task::yield_now().await;
    Err(Error::MissingInput)
}

fn parse_buffer(buffer: Vec<u8>) -> Result<Value> {
    let text = String::from_utf8(buffer)
        .map_err(|e| Error::Parse(format!("credential data is not UTF-8: {e}")))?;
    serde_json::from_str(&text).map_err(|e| Error::Parse(e.to_string()))
}
