//! Crate-level error types shared across the interactor, stores, and transport.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[from] crate::store::StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Failure raised while consuming a chat stream.
	#[error(transparent)]
	Stream(#[from] StreamError),

	/// No identity provider has been selected yet.
	#[error("No identity provider is selected.")]
	NoProviderSelected,
	/// The token endpoint rejected the refresh attempt.
	#[error("Token refresh was rejected: {reason}.")]
	RefreshFailed {
		/// Provider-supplied reason string or a body preview.
		reason: String,
		/// HTTP status code, when the provider answered at all.
		status: Option<u16>,
	},
	/// Interactive authorization could not produce a usable token set.
	#[error("Interactive authorization failed: {reason}.")]
	AuthorizationFailed {
		/// Launcher- or validation-supplied reason string.
		reason: String,
	},
	/// The bounded retry loop exhausted every attempt without a response.
	#[error("Request gave up after {attempts} attempts without any response.")]
	MaxRetriesExceeded {
		/// Number of attempts performed, including the first.
		attempts: u32,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A provider endpoint URL is invalid or cannot be rebased.
	#[error("Provider endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure, when one exists.
		#[source]
		source: Option<url::ParseError>,
	},
	/// An outgoing header value contains bytes the transport rejects.
	#[error("Header value for `{name}` is invalid.")]
	InvalidHeaderValue {
		/// Header name as it would have been sent.
		name: String,
	},

	/// Stored token set carries no refresh token.
	#[error("Stored token set is missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// A token set is missing at least one of its four required fields.
	#[error("Token set is missing the `{field}` field.")]
	IncompleteTokenSet {
		/// Name of the first absent field.
		field: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while dispatching the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while dispatching the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures terminating an active chat stream.
///
/// A stream surfaces at most one of these, as its final item; values yielded
/// before the failure remain valid.
#[derive(Debug, ThisError)]
pub enum StreamError {
	/// The streaming endpoint answered with a non-success status.
	#[error("Streaming endpoint returned status {status}.")]
	Status {
		/// HTTP status code of the rejected stream.
		status: u16,
		/// Leading bytes of the response body, for diagnostics.
		body_preview: String,
	},
	/// A chunk could not be decoded as UTF-8 text.
	#[error("Stream chunk is not valid UTF-8.")]
	Utf8(#[from] std::str::Utf8Error),
	/// A line could not be decoded as JSON.
	#[error("Stream line is not valid JSON.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// The underlying byte stream failed mid-flight.
	#[error("Stream body failed mid-flight.")]
	Body {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl StreamError {
	/// Wraps a transport-specific body failure.
	pub fn body(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Body { source: Box::new(src) }
	}
}
