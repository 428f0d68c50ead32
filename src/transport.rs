//! Authenticated decorator over a generic HTTP transport.
//!
//! Every verb, every retry attempt, and every stream re-resolves its
//! credential through the interactor before dispatch, so a 401 on one
//! attempt can be healed by a refresh on the next.

pub mod stream;
pub use stream::ChatChunk;

// crates.io
use futures::Stream;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::{ConfigError, StreamError},
	http::{BufferedResponse, HttpClient, Method, OutboundRequest, RequestBody},
	interactor::AuthInteractor,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Statuses the bounded retry loop treats as transient.
const RETRYABLE_STATUSES: [u16; 3] = [401, 500, 503];

/// Boxed stream of mapped chat values ending at the first error.
pub type ChatStream<U> = Pin<Box<dyn Stream<Item = Result<U>> + Send>>;

/// Per-call request parameters for the plain verbs.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Extra outgoing headers.
	pub headers: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<RequestBody>,
	/// Per-call timeout; falls back to the transport-wide default.
	pub timeout: Option<Duration>,
}
impl RequestOptions {
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
}

/// HTTP client decorator that injects credentials resolved by the interactor.
#[derive(Clone)]
pub struct AuthenticatedTransport {
	http: Arc<dyn HttpClient>,
	interactor: Arc<AuthInteractor>,
	default_timeout: Option<Duration>,
}
impl AuthenticatedTransport {
	/// Wraps a transport and the interactor that guards it.
	pub fn new(http: Arc<dyn HttpClient>, interactor: Arc<AuthInteractor>) -> Self {
		Self { http, interactor, default_timeout: None }
	}

	/// Sets a timeout applied to plain calls that do not carry their own.
	///
	/// Streams are exempt: a whole-request timeout would kill long-lived
	/// token delivery mid-answer.
	pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout = Some(timeout);

		self
	}

	/// Returns the interactor backing this transport.
	pub fn interactor(&self) -> &Arc<AuthInteractor> {
		&self.interactor
	}

	/// GET.
	pub async fn get(&self, url: Url, options: RequestOptions) -> Result<BufferedResponse> {
		self.request(Method::Get, url, options).await
	}

	/// POST.
	pub async fn post(&self, url: Url, options: RequestOptions) -> Result<BufferedResponse> {
		self.request(Method::Post, url, options).await
	}

	/// PUT.
	pub async fn put(&self, url: Url, options: RequestOptions) -> Result<BufferedResponse> {
		self.request(Method::Put, url, options).await
	}

	/// PATCH.
	pub async fn patch(&self, url: Url, options: RequestOptions) -> Result<BufferedResponse> {
		self.request(Method::Patch, url, options).await
	}

	/// DELETE.
	pub async fn delete(&self, url: Url, options: RequestOptions) -> Result<BufferedResponse> {
		self.request(Method::Delete, url, options).await
	}

	/// HEAD.
	pub async fn head(&self, url: Url, options: RequestOptions) -> Result<BufferedResponse> {
		self.request(Method::Head, url, options).await
	}

	/// Dispatches one request with a freshly resolved credential attached.
	pub async fn request(
		&self,
		method: Method,
		url: Url,
		options: RequestOptions,
	) -> Result<BufferedResponse> {
		obs::record_flow_outcome(FlowKind::Request, FlowOutcome::Attempt);

		let request = self.authorized_request(method, url, &options).await?;
		let result = self.http.execute(request).await.map_err(Error::from);

		match &result {
			Ok(_) => obs::record_flow_outcome(FlowKind::Request, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(FlowKind::Request, FlowOutcome::Failure),
		}

		result
	}

	/// Bounded-retry GET: up to `max_retries + 1` attempts.
	///
	/// A 2xx returns at once. 401/500/503 are recorded as the failing
	/// response and retried with a re-resolved credential; any other status
	/// returns immediately. Transport-level failures are swallowed except on
	/// the final attempt. When every attempt failed transiently the last
	/// failing response is returned as-is; callers inspect the status
	/// themselves. The loop is tight; rate-limited backends need their own
	/// delay.
	pub async fn retry_request(
		&self,
		url: Url,
		max_retries: u32,
		options: RequestOptions,
	) -> Result<BufferedResponse> {
		const KIND: FlowKind = FlowKind::RetryRequest;

		let span = FlowSpan::new(KIND, "retry_request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let attempts = max_retries + 1;
		let result = span
			.instrument(async move {
				let mut failing: Option<BufferedResponse> = None;

				for attempt in 1..=attempts {
					let request =
						self.authorized_request(Method::Get, url.clone(), &options).await?;

					match self.http.execute(request).await {
						Ok(response) if response.is_success() => return Ok(response),
						Ok(response) if RETRYABLE_STATUSES.contains(&response.status) => {
							failing = Some(response);
						},
						Ok(response) => return Ok(response),
						Err(e) if attempt == attempts => return Err(e.into()),
						Err(_) => {},
					}
				}

				match failing {
					Some(response) => Ok(response),
					None => Err(Error::MaxRetriesExceeded { attempts }),
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Streaming chat POST: sends `{"text": prompt}` and decodes the NDJSON
	/// response through the caller's mapping function.
	///
	/// Any failure at any stage ends the sequence with a single terminal
	/// error item; values yielded before it stand. The bounded-retry policy
	/// never applies here, and dropping the stream releases the connection.
	pub fn post_stream<T, U, F>(&self, url: Url, prompt: impl Into<String>, map: F) -> ChatStream<U>
	where
		T: DeserializeOwned + Send + 'static,
		U: Send + 'static,
		F: FnMut(T) -> U + Send + 'static,
	{
		const KIND: FlowKind = FlowKind::Stream;

		let http = self.http.clone();
		let interactor = self.interactor.clone();
		let prompt = prompt.into();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		Box::pin(async_stream::try_stream! {
			let mut map = map;
			let credential = interactor.ensure_credential().await?;
			let body = RequestBody::json(&serde_json::json!({ "text": prompt }))
				.map_err(|e| Error::from(StreamError::body(e)))?;
			let mut request = OutboundRequest::new(Method::Post, url)
				.header("accept", "application/json")
				.body(body)
				.follow_redirects();

			if let Some(secret) = credential.bearer() {
				request = request.header("authorization", bearer_value(secret.expose())?);
			}

			let response = http.open_stream(request).await?;

			if !(200..300).contains(&response.status) {
				let body_preview = stream::read_preview(response.bytes).await;

				Err(Error::from(StreamError::Status { status: response.status, body_preview }))?;
			} else {
				let decoded = stream::decode_ndjson::<T>(response.bytes);

				for await value in decoded {
					yield map(value?);
				}
			}
		})
	}

	async fn authorized_request(
		&self,
		method: Method,
		url: Url,
		options: &RequestOptions,
	) -> Result<OutboundRequest> {
		let mut request = OutboundRequest::new(method, url);

		for (name, value) in &options.headers {
			request = request.header(name.clone(), value.clone());
		}
		if let Some(body) = &options.body {
			request = request.body(body.clone());
		}
		if let Some(timeout) = options.timeout.or(self.default_timeout) {
			request = request.timeout(timeout);
		}
		if let Credential::Bearer(secret) = self.interactor.ensure_credential().await? {
			request = request.header("authorization", bearer_value(secret.expose())?);
		}

		Ok(request)
	}
}
impl Debug for AuthenticatedTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedTransport")
			.field("default_timeout", &self.default_timeout)
			.finish()
	}
}

fn bearer_value(token: &str) -> Result<String> {
	if token.chars().any(|c| c.is_ascii_control() || !c.is_ascii()) {
		return Err(ConfigError::InvalidHeaderValue { name: "authorization".into() }.into());
	}

	Ok(format!("Bearer {token}"))
}
