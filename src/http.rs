//! Transport primitives decorated by the authenticated transport.
//!
//! [`HttpClient`] is the crate's only seam onto an HTTP stack: the interactor
//! uses it for token-endpoint and logout calls, the authenticated transport
//! for every application request and stream. The reqwest-backed
//! implementation keeps two inner clients because token endpoints must not
//! follow redirects while chat streams must.

// crates.io
use futures::Stream;
#[cfg(feature = "reqwest")] use futures::TryStreamExt;
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`HttpClient`] operations.
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;
/// Boxed byte stream produced by a streaming response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// HTTP verbs supported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// GET.
	Get,
	/// POST.
	Post,
	/// PUT.
	Put,
	/// PATCH.
	Patch,
	/// DELETE.
	Delete,
	/// HEAD.
	Head,
}
impl Method {
	/// Returns the canonical verb label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
			Method::Head => "HEAD",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request body payload plus its content type.
#[derive(Clone, Debug)]
pub struct RequestBody {
	/// MIME type sent as `Content-Type`.
	pub content_type: &'static str,
	/// Raw payload bytes.
	pub bytes: Vec<u8>,
}
impl RequestBody {
	/// Serializes a value as a JSON body.
	pub fn json(value: &impl Serialize) -> Result<Self, serde_json::Error> {
		Ok(Self { content_type: "application/json", bytes: serde_json::to_vec(value)? })
	}

	/// Encodes key/value pairs as an `application/x-www-form-urlencoded` body.
	pub fn form(pairs: &[(&str, &str)]) -> Self {
		let mut serializer = url::form_urlencoded::Serializer::new(String::new());

		for (key, value) in pairs {
			serializer.append_pair(key, value);
		}

		Self {
			content_type: "application/x-www-form-urlencoded",
			bytes: serializer.finish().into_bytes(),
		}
	}
}

/// One outbound HTTP request, transport-agnostic.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Outgoing headers in insertion order.
	pub headers: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<RequestBody>,
	/// Optional per-call timeout; `None` waits on the network indefinitely.
	pub timeout: Option<Duration>,
	/// Whether the transport may follow redirects. Defaults to `false`;
	/// streaming chat calls switch it on.
	pub follow_redirects: bool,
}
impl OutboundRequest {
	/// Creates a request with no headers, body, or timeout.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: None, timeout: None, follow_redirects: false }
	}

	/// Appends an outgoing header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Attaches a request body.
	pub fn body(mut self, body: RequestBody) -> Self {
		self.body = Some(body);

		self
	}

	/// Sets the per-call timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Allows the transport to follow redirects for this request.
	pub fn follow_redirects(mut self) -> Self {
		self.follow_redirects = true;

		self
	}
}

/// Fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct BufferedResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers, lossily decoded to strings.
	pub headers: Vec<(String, String)>,
	/// Response body bytes.
	pub body: Bytes,
}
impl BufferedResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Decodes the body as lossy UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON with pathful diagnostics.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::error::Error>>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}
}

/// Response whose body is consumed incrementally.
pub struct StreamingResponse {
	/// HTTP status code.
	pub status: u16,
	/// Body bytes as they arrive; dropping the stream releases the connection.
	pub bytes: ByteStream,
}
impl Debug for StreamingResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamingResponse").field("status", &self.status).finish()
	}
}

/// Abstraction over HTTP transports, object-safe so the interactor and the
/// authenticated transport can share one `Arc<dyn HttpClient>`.
pub trait HttpClient
where
	Self: 'static + Send + Sync,
{
	/// Dispatches a request and buffers the full response.
	fn execute(&self, request: OutboundRequest) -> HttpFuture<'_, BufferedResponse>;

	/// Dispatches a request and hands back the response body as a byte stream.
	fn open_stream(&self, request: OutboundRequest) -> HttpFuture<'_, StreamingResponse>;
}

/// Reqwest-backed [`HttpClient`].
///
/// Holds a redirect-disabled client for plain and token-endpoint calls and a
/// redirect-following client for streams, matching OAuth 2.0 guidance that
/// token endpoints return results directly instead of delegating to another
/// URI.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient {
	plain: ReqwestClient,
	streaming: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds the default client pair.
	pub fn new() -> Result<Self, ConfigError> {
		let plain = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;
		let streaming = ReqwestClient::builder().build()?;

		Ok(Self { plain, streaming })
	}

	/// Wraps caller-configured clients; `plain` should have redirects disabled.
	pub fn with_clients(plain: ReqwestClient, streaming: ReqwestClient) -> Self {
		Self { plain, streaming }
	}

	fn build_request(
		&self,
		request: OutboundRequest,
	) -> Result<reqwest::Request, TransportError> {
		let client = self.client_for(request.follow_redirects);
		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
			Method::Head => reqwest::Method::HEAD,
		};
		let mut builder = client.request(method, request.url);

		for (name, value) in request.headers {
			builder = builder.header(name, value);
		}
		if let Some(body) = request.body {
			builder = builder.header("content-type", body.content_type).body(body.bytes);
		}
		if let Some(timeout) = request.timeout {
			// Negative durations cannot convert; clamp to an immediate timeout.
			builder = builder.timeout(timeout.try_into().unwrap_or(std::time::Duration::ZERO));
		}

		Ok(builder.build()?)
	}

	fn client_for(&self, follow_redirects: bool) -> &ReqwestClient {
		if follow_redirects { &self.streaming } else { &self.plain }
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestHttpClient {
	fn execute(&self, request: OutboundRequest) -> HttpFuture<'_, BufferedResponse> {
		Box::pin(async move {
			let follow = request.follow_redirects;
			let built = self.build_request(request)?;
			let response = self.client_for(follow).execute(built).await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned())
				})
				.collect();
			let body = response.bytes().await?;

			Ok(BufferedResponse { status, headers, body })
		})
	}

	fn open_stream(&self, request: OutboundRequest) -> HttpFuture<'_, StreamingResponse> {
		Box::pin(async move {
			let follow = request.follow_redirects;
			let built = self.build_request(request)?;
			let response = self.client_for(follow).execute(built).await?;
			let status = response.status().as_u16();
			let bytes: ByteStream = Box::pin(response.bytes_stream().map_err(TransportError::from));

			Ok(StreamingResponse { status, bytes })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn form_bodies_are_urlencoded() {
		let body = RequestBody::form(&[("grant_type", "refresh_token"), ("refresh_token", "a b")]);

		assert_eq!(body.content_type, "application/x-www-form-urlencoded");
		assert_eq!(
			String::from_utf8_lossy(&body.bytes),
			"grant_type=refresh_token&refresh_token=a+b",
		);
	}

	#[test]
	fn buffered_response_classifies_statuses() {
		let ok = BufferedResponse { status: 204, headers: Vec::new(), body: Bytes::new() };
		let server_error =
			BufferedResponse { status: 503, headers: Vec::new(), body: Bytes::from_static(b"busy") };

		assert!(ok.is_success());
		assert!(!server_error.is_success());
		assert_eq!(server_error.text(), "busy");
	}

	#[test]
	fn json_decoding_reports_paths() {
		let response = BufferedResponse {
			status: 200,
			headers: Vec::new(),
			body: Bytes::from_static(b"{\"expires_in\":\"oops\"}"),
		};
		response.json::<serde_json::Value>().expect("Value decoding should accept arbitrary JSON.");

		#[derive(Debug, serde::Deserialize)]
		struct Strict {
			#[allow(dead_code)]
			expires_in: u64,
		}

		let err =
			response.json::<Strict>().expect_err("Strict decoding should fail on a string.");

		assert!(err.path().to_string().contains("expires_in"));
	}
}
