//! The four-field OIDC token set and its freshness predicates.

// self
use crate::{_prelude::*, auth::secret::TokenSecret, error::ConfigError};

/// How long before the recorded expiry a token is already treated as expiring.
///
/// The window absorbs clock skew and the latency of the request the token is
/// about to be attached to.
pub const EXPIRATION_BUFFER: Duration = Duration::seconds(30);

/// The four-tuple persisted for an authenticated session.
///
/// A token set is only ever replaced wholesale: refresh overwrites every
/// field, logout deletes every field. Web-variant refreshes legitimately
/// leave `id_token` empty because the `refresh_token` grant does not return
/// one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
	/// OIDC identity token; may be empty after a web-variant refresh.
	pub id_token: TokenSecret,
	/// Bearer token attached to outgoing requests.
	pub access_token: TokenSecret,
	/// Absolute instant at which the access token stops being accepted.
	pub expires_at: OffsetDateTime,
	/// Long-lived secret exchanged for fresh access tokens.
	pub refresh_token: TokenSecret,
}
impl TokenSet {
	/// Builds a token set from the four raw values.
	pub fn new(
		id_token: impl Into<String>,
		access_token: impl Into<String>,
		expires_at: OffsetDateTime,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			id_token: TokenSecret::new(id_token),
			access_token: TokenSecret::new(access_token),
			expires_at,
			refresh_token: TokenSecret::new(refresh_token),
		}
	}

	/// Checks that every field an interactive authorization must deliver is present.
	///
	/// Returns the first missing field as a [`ConfigError::IncompleteTokenSet`] so
	/// callers can refuse to persist partial acquisitions.
	pub fn ensure_complete(&self) -> Result<(), ConfigError> {
		if self.id_token.is_empty() {
			return Err(ConfigError::IncompleteTokenSet { field: "id_token" });
		}
		if self.access_token.is_empty() {
			return Err(ConfigError::IncompleteTokenSet { field: "access_token" });
		}
		if self.refresh_token.is_empty() {
			return Err(ConfigError::IncompleteTokenSet { field: "refresh_token" });
		}

		Ok(())
	}

	/// Returns `true` when the token is inside the expiration buffer at `now`.
	///
	/// The bound is inclusive: a token expiring exactly at `now + buffer` is
	/// already expiring.
	pub fn is_expiring_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at <= now + EXPIRATION_BUFFER
	}

	/// Convenience helper evaluating [`Self::is_expiring_at`] against the current clock.
	pub fn is_expiring(&self) -> bool {
		self.is_expiring_at(OffsetDateTime::now_utc())
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("id_token", &"<redacted>")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}

/// Classifies an optional cached token set; an absent set counts as expiring.
pub fn is_expiring_at(token_set: Option<&TokenSet>, now: OffsetDateTime) -> bool {
	token_set.is_none_or(|ts| ts.is_expiring_at(now))
}

/// Credential resolved for one outgoing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
	/// Authentication is disabled; send the request without a bearer header.
	Anonymous,
	/// A fresh access token ready to be attached as `Authorization: Bearer`.
	Bearer(TokenSecret),
	/// A browser-redirect authorization was launched; real tokens arrive via
	/// the redirect callback, so the request goes out unauthenticated.
	Pending,
}
impl Credential {
	/// Returns the bearer secret, when one was resolved.
	pub fn bearer(&self) -> Option<&TokenSecret> {
		match self {
			Credential::Bearer(secret) => Some(secret),
			Credential::Anonymous | Credential::Pending => None,
		}
	}
}
