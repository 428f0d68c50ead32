//! The credential state machine: freshness classification, refresh,
//! interactive authorization fallback, and logout.
//!
//! [`AuthInteractor`] owns both persisted records (token set + selected
//! provider) exclusively; no other component mutates them. One instance is
//! shared by reference between the authenticated transport and the UI layer,
//! and the `auth_enabled` switch lives on the instance itself instead of any
//! ambient static state.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSet, is_expiring_at},
	error::ConfigError,
	http::{HttpClient, Method, OutboundRequest, RequestBody},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderConfig,
	store::{CredentialStore, records},
};

const REASON_PREVIEW_LEN: usize = 200;
// 100 years; anything beyond this is a provider bug, not a real expiry.
const MAX_EXPIRES_IN_SECS: i64 = 3_155_760_000;

/// Result of one interactive authorization attempt.
#[derive(Clone, Debug)]
pub enum AuthorizationOutcome {
	/// The launcher delivered a complete token set synchronously (native
	/// app-auth environments).
	Completed(TokenSet),
	/// The launcher kicked off a browser redirect; real tokens arrive later
	/// through [`AuthInteractor::complete_authorization`].
	Pending,
}

/// Boxed future returned by [`LoginLauncher::launch`].
pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<AuthorizationOutcome>> + 'a + Send>>;

/// Platform capability performing the interactive leg of authorization.
///
/// Two variants ship the same contract: native app-auth environments resolve
/// to [`AuthorizationOutcome::Completed`] with all four token fields, while
/// browser-redirect environments (see [`RedirectLauncher`]) return
/// [`AuthorizationOutcome::Pending`] immediately and rely on the redirect
/// callback to finish the job. The variant is chosen once at process start by
/// injecting the matching implementation.
pub trait LoginLauncher
where
	Self: Send + Sync,
{
	/// Starts interactive authorization against the provider.
	fn launch<'a>(&'a self, provider: &'a ProviderConfig) -> LaunchFuture<'a>;
}

/// Browser-redirect [`LoginLauncher`]: hands the provider's login URL to a
/// caller-supplied opener and reports the authorization as pending.
pub struct RedirectLauncher<F>
where
	F: Fn(&Url) + Send + Sync,
{
	open: F,
}
impl<F> RedirectLauncher<F>
where
	F: Fn(&Url) + Send + Sync,
{
	/// Wraps the platform's "open this URL in a browser" capability.
	pub fn new(open: F) -> Self {
		Self { open }
	}
}
impl<F> LoginLauncher for RedirectLauncher<F>
where
	F: Fn(&Url) + Send + Sync,
{
	fn launch<'a>(&'a self, provider: &'a ProviderConfig) -> LaunchFuture<'a> {
		Box::pin(async move {
			(self.open)(&provider.login_endpoint);

			Ok(AuthorizationOutcome::Pending)
		})
	}
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	refresh_token: String,
	expires_in: Option<i64>,
	#[serde(default)]
	id_token: Option<String>,
}

/// Owns credential acquisition, caching, refresh, and logout.
pub struct AuthInteractor {
	store: Arc<dyn CredentialStore>,
	http: Arc<dyn HttpClient>,
	launcher: Arc<dyn LoginLauncher>,
	auth_enabled: AtomicBool,
	// Single-flight: concurrent expiring-token observers coalesce into one
	// refresh instead of racing each other's store writes.
	refresh_guard: AsyncMutex<()>,
}
impl AuthInteractor {
	/// Creates an interactor with authentication disabled until a provider is
	/// confirmed reachable.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		http: Arc<dyn HttpClient>,
		launcher: Arc<dyn LoginLauncher>,
	) -> Self {
		Self {
			store,
			http,
			launcher,
			auth_enabled: AtomicBool::new(false),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Enables authentication from construction; handy for tests and
	/// single-provider installs.
	pub fn with_auth_enabled(self, enabled: bool) -> Self {
		self.auth_enabled.store(enabled, Ordering::Relaxed);

		self
	}

	/// Returns whether credential resolution is active.
	pub fn auth_enabled(&self) -> bool {
		self.auth_enabled.load(Ordering::Relaxed)
	}

	/// Toggles credential resolution; callers flip this on once a provider is
	/// confirmed reachable.
	pub fn set_auth_enabled(&self, enabled: bool) {
		self.auth_enabled.store(enabled, Ordering::Relaxed);
	}

	/// Reads the selected provider record, if one is persisted.
	pub async fn selected_provider(&self) -> Result<Option<ProviderConfig>> {
		Ok(records::load_provider(self.store.as_ref()).await?)
	}

	/// Persists the selected provider record.
	///
	/// Selecting a new provider while logged in is undefined; callers are
	/// expected to [`logout`](Self::logout) first.
	pub async fn select_provider(&self, provider: &ProviderConfig) -> Result<()> {
		Ok(records::save_provider(self.store.as_ref(), provider).await?)
	}

	/// Resolves a credential for one outgoing request.
	///
	/// Anonymous mode returns immediately without touching the store. Fresh
	/// cached tokens are reused; expiring or absent ones trigger a refresh,
	/// whose failure silently falls back to interactive authorization exactly
	/// once. A failure of that fallback propagates; there is no third path.
	pub async fn ensure_credential(&self) -> Result<Credential> {
		if !self.auth_enabled() {
			return Ok(Credential::Anonymous);
		}

		let _singleflight = self.refresh_guard.lock().await;
		// Re-read under the guard: a concurrent caller may have refreshed
		// while this one waited.
		let cached = records::load_token_set(self.store.as_ref()).await?;
		let now = OffsetDateTime::now_utc();

		if let Some(token_set) = &cached
			&& !is_expiring_at(Some(token_set), now)
		{
			return Ok(Credential::Bearer(token_set.access_token.clone()));
		}

		match self.refresh_locked().await {
			Ok(token_set) => Ok(Credential::Bearer(token_set.access_token)),
			Err(refresh_error) => {
				// Refresh failures are expected (expired refresh token,
				// provider restart); fall through to interactive auth.
				obs::debug_event(&format!("token refresh failed: {refresh_error}"));

				match self.authorize_locked().await? {
					AuthorizationOutcome::Completed(token_set) =>
						Ok(Credential::Bearer(token_set.access_token)),
					AuthorizationOutcome::Pending => Ok(Credential::Pending),
				}
			},
		}
	}

	/// Exchanges the stored refresh token for a fresh token set and persists it.
	pub async fn refresh(&self) -> Result<TokenSet> {
		let _singleflight = self.refresh_guard.lock().await;

		self.refresh_locked().await
	}

	/// Starts interactive authorization through the platform launcher.
	///
	/// Completed outcomes are validated for all four token fields and
	/// persisted before returning; pending outcomes persist nothing.
	pub async fn authorize_interactively(&self) -> Result<AuthorizationOutcome> {
		let _singleflight = self.refresh_guard.lock().await;

		self.authorize_locked().await
	}

	/// Persists tokens delivered by the redirect callback collaborator.
	///
	/// This is the completion half of the pending web-redirect flow.
	pub async fn complete_authorization(&self, token_set: TokenSet) -> Result<()> {
		token_set
			.ensure_complete()
			.map_err(|e| Error::AuthorizationFailed { reason: e.to_string() })?;

		let _singleflight = self.refresh_guard.lock().await;

		records::save_token_set(self.store.as_ref(), &token_set).await?;

		Ok(())
	}

	/// Ends the session remotely when possible and locally unconditionally.
	///
	/// The remote logout call is best-effort: its failure is logged and
	/// swallowed, because local state must never retain credentials the UI
	/// believes are logged out. Only storage failures surface.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;
				let provider = records::load_provider(self.store.as_ref()).await?;
				let token_set = records::load_token_set(self.store.as_ref()).await?;

				if let (Some(provider), Some(token_set)) = (provider, token_set)
					&& let Err(e) = self.remote_logout(&provider, &token_set).await
				{
					obs::debug_event(&format!("remote logout failed: {e}"));
				}

				records::clear_token_set(self.store.as_ref()).await?;
				records::clear_provider(self.store.as_ref()).await?;

				Ok(())
			})
			.await;

		match &result {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn refresh_locked(&self) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let provider = records::load_provider(self.store.as_ref())
					.await?
					.ok_or(Error::NoProviderSelected)?;
				let refresh_token = records::load_token_set(self.store.as_ref())
					.await?
					.map(|ts| ts.refresh_token)
					.filter(|rt| !rt.is_empty())
					.ok_or(ConfigError::MissingRefreshToken)?;
				let body = RequestBody::form(&[
					("grant_type", "refresh_token"),
					("refresh_token", refresh_token.expose()),
					("client_id", &provider.client_id),
				]);
				let request = OutboundRequest::new(Method::Post, provider.token_endpoint.clone())
					.header("accept", "application/json")
					.body(body);
				let now = OffsetDateTime::now_utc();
				let response = self.http.execute(request).await?;

				if !response.is_success() {
					return Err(Error::RefreshFailed {
						reason: preview(&response.text()),
						status: Some(response.status),
					});
				}

				let payload: TokenEndpointResponse = response
					.json()
					.map_err(|source| ConfigError::TokenResponseParse { source })?;
				let expires_in = payload.expires_in.ok_or(ConfigError::MissingExpiresIn)?;

				if expires_in <= 0 {
					return Err(ConfigError::NonPositiveExpiresIn.into());
				}
				if expires_in > MAX_EXPIRES_IN_SECS {
					return Err(ConfigError::ExpiresInOutOfRange.into());
				}

				let token_set = TokenSet::new(
					payload.id_token.unwrap_or_default(),
					payload.access_token,
					now + Duration::seconds(expires_in),
					payload.refresh_token,
				);

				records::save_token_set(self.store.as_ref(), &token_set).await?;

				Ok(token_set)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn authorize_locked(&self) -> Result<AuthorizationOutcome> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "authorize_interactively");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let provider = records::load_provider(self.store.as_ref())
					.await?
					.ok_or(Error::NoProviderSelected)?;

				match self.launcher.launch(&provider).await? {
					AuthorizationOutcome::Completed(token_set) => {
						token_set
							.ensure_complete()
							.map_err(|e| Error::AuthorizationFailed { reason: e.to_string() })?;
						records::save_token_set(self.store.as_ref(), &token_set).await?;

						Ok(AuthorizationOutcome::Completed(token_set))
					},
					AuthorizationOutcome::Pending => Ok(AuthorizationOutcome::Pending),
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn remote_logout(&self, provider: &ProviderConfig, token_set: &TokenSet) -> Result<()> {
		if token_set.refresh_token.is_empty() {
			return Ok(());
		}

		let endpoint = logout_endpoint(provider)?;
		let body = RequestBody::form(&[
			("refresh_token", token_set.refresh_token.expose()),
			("client_id", &provider.client_id),
		]);
		let request = OutboundRequest::new(Method::Post, endpoint).body(body);
		let response = self.http.execute(request).await?;

		if !response.is_success() {
			return Err(Error::RefreshFailed {
				reason: preview(&response.text()),
				status: Some(response.status),
			});
		}

		Ok(())
	}
}
impl Debug for AuthInteractor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthInteractor").field("auth_enabled", &self.auth_enabled()).finish()
	}
}

fn logout_endpoint(provider: &ProviderConfig) -> Result<Url> {
	let base = provider.issuer.as_str().trim_end_matches('/');

	Url::parse(&format!("{base}/protocol/openid-connect/logout"))
		.map_err(|e| ConfigError::InvalidEndpoint { source: Some(e) }.into())
}

fn preview(body: &str) -> String {
	if body.len() <= REASON_PREVIEW_LEN {
		return body.to_owned();
	}

	let mut end = REASON_PREVIEW_LEN;

	while !body.is_char_boundary(end) {
		end -= 1;
	}

	format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn logout_endpoint_handles_trailing_slashes() {
		let with_slash = Url::parse("https://id.example.com/realms/chat/")
			.expect("Issuer fixture should parse.");
		let without_slash = Url::parse("https://id.example.com/realms/chat")
			.expect("Issuer fixture should parse.");
		let provider = |issuer: Url| ProviderConfig {
			id: crate::provider::ProviderId::new("p").expect("Provider id should be valid."),
			title: "P".into(),
			issuer,
			token_endpoint: Url::parse("https://id.example.com/token")
				.expect("Token endpoint fixture should parse."),
			login_endpoint: Url::parse("https://chat.example.com/login/p")
				.expect("Login endpoint fixture should parse."),
			client_id: "client".into(),
			redirect_url: Url::parse("https://chat.example.com/auth/p")
				.expect("Redirect fixture should parse."),
			scopes: vec!["openid".into()],
		};

		for issuer in [with_slash, without_slash] {
			let endpoint = logout_endpoint(&provider(issuer))
				.expect("Logout endpoint should derive from the issuer.");

			assert_eq!(
				endpoint.as_str(),
				"https://id.example.com/realms/chat/protocol/openid-connect/logout",
			);
		}
	}

	#[test]
	fn preview_truncates_on_char_boundaries() {
		let short = preview("abc");
		let long = preview(&"é".repeat(200));

		assert_eq!(short, "abc");
		assert!(long.ends_with('…'));
		assert!(long.chars().count() < 201);
	}
}
