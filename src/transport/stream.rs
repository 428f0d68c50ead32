//! Newline-delimited JSON decoding for chunked chat responses.
//!
//! The backend streams one JSON object per line; chunk boundaries fall
//! anywhere, so partial lines are buffered until their terminating newline
//! arrives and the trailing unterminated line is flushed at end of stream.
//! Any failure terminates the decoded sequence with a single error item.

// crates.io
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::StreamError, http::ByteStream};

const PREVIEW_LIMIT: usize = 256;

/// Canonical chunk shape streamed by the chat backend, one per NDJSON line.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatChunk {
	/// Speaker role; the backend emits `model` for generated text.
	pub role: String,
	/// Text fragment to append to the running answer.
	pub content: String,
	/// Server-side emission time, RFC 3339.
	#[serde(default)]
	pub timestamp: Option<String>,
}

/// Decodes a byte stream into one value per non-empty NDJSON line.
///
/// Values are yielded in transmission order; nothing is buffered beyond the
/// current partial line. The stream ends right after the first error.
pub(crate) fn decode_ndjson<T>(bytes: ByteStream) -> impl Stream<Item = Result<T, StreamError>> + Send
where
	T: DeserializeOwned + Send + 'static,
{
	try_stream! {
		let mut bytes = bytes;
		let mut buffer: Vec<u8> = Vec::new();

		while let Some(chunk) = bytes.next().await {
			let chunk = chunk.map_err(StreamError::body)?;

			buffer.extend_from_slice(&chunk);

			while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
				let line: Vec<u8> = buffer.drain(..=pos).collect();

				if let Some(value) = decode_line::<T>(&line[..line.len() - 1])? {
					yield value;
				}
			}
		}

		// Flush a trailing line the server never terminated.
		if !buffer.is_empty() {
			if let Some(value) = decode_line::<T>(&buffer)? {
				yield value;
			}
		}
	}
}

fn decode_line<T>(raw: &[u8]) -> Result<Option<T>, StreamError>
where
	T: DeserializeOwned,
{
	let text = std::str::from_utf8(raw)?.trim_end_matches('\r');

	if text.is_empty() {
		return Ok(None);
	}

	// Defensive: if the server ever packs several objects into one line,
	// decode the last newline-delimited segment, mirroring the backend's
	// framing contract.
	let payload = text.rsplit('\n').next().unwrap_or(text);
	let mut deserializer = serde_json::Deserializer::from_str(payload);
	let value = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| StreamError::Decode { source })?;

	Ok(Some(value))
}

/// Drains up to [`PREVIEW_LIMIT`] bytes from a rejected stream for diagnostics.
pub(crate) async fn read_preview(mut bytes: ByteStream) -> String {
	let mut collected: Vec<u8> = Vec::new();

	while collected.len() < PREVIEW_LIMIT {
		match bytes.next().await {
			Some(Ok(chunk)) => collected.extend_from_slice(&chunk),
			Some(Err(_)) | None => break,
		}
	}

	collected.truncate(PREVIEW_LIMIT);

	String::from_utf8_lossy(&collected).into_owned()
}
