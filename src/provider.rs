//! Immutable identity-provider descriptions consumed by the interactor.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::{_prelude::*, error::ConfigError};

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when provider identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ProviderIdError {
	/// The identifier was empty or whitespace.
	#[error("Provider identifier must not be empty.")]
	Empty,
	/// The identifier exceeded the maximum supported length.
	#[error("Provider identifier exceeds {IDENTIFIER_MAX_LEN} characters.")]
	TooLong,
}

/// Validated identifier naming one identity provider.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);
impl ProviderId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ProviderIdError> {
		let view = value.as_ref();

		if view.trim().is_empty() {
			return Err(ProviderIdError::Empty);
		}
		if view.len() > IDENTIFIER_MAX_LEN {
			return Err(ProviderIdError::TooLong);
		}

		Ok(Self(view.to_owned()))
	}
}
impl Deref for ProviderId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ProviderId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ProviderId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ProviderId> for String {
	fn from(value: ProviderId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ProviderId {
	type Error = ProviderIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(&value)
	}
}
impl FromStr for ProviderId {
	type Err = ProviderIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for ProviderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ProviderId({})", self.0)
	}
}
impl Display for ProviderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Immutable description of one identity provider.
///
/// Exactly one config is selected (persisted) at a time, alongside the token
/// set. Selecting a new provider without logging out first is undefined;
/// callers are expected to log out before switching.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
	/// Provider identifier.
	pub id: ProviderId,
	/// Human-readable title shown by login pickers.
	pub title: String,
	/// Issuer base URL; the logout endpoint hangs off this.
	pub issuer: Url,
	/// Token endpoint used for `refresh_token` grants.
	pub token_endpoint: Url,
	/// Interactive login URL opened by the platform launcher.
	pub login_endpoint: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Redirect target the provider sends the browser back to.
	pub redirect_url: Url,
	/// Requested scopes, order preserved.
	pub scopes: Vec<String>,
}
impl ProviderConfig {
	/// Returns a copy whose login endpoint points at an alternate deployment.
	///
	/// Only the scheme, host, and port are taken from `base`; the login path
	/// and query survive unchanged. Used when the user points the client at a
	/// different installation of the same provider.
	pub fn rebind_login_endpoint(&self, base: &Url) -> Result<Self, ConfigError> {
		let mut login = self.login_endpoint.clone();

		login
			.set_scheme(base.scheme())
			.map_err(|()| ConfigError::InvalidEndpoint { source: None })?;
		login
			.set_host(base.host_str())
			.map_err(|e| ConfigError::InvalidEndpoint { source: Some(e) })?;
		login.set_port(base.port()).map_err(|()| ConfigError::InvalidEndpoint { source: None })?;

		Ok(Self { login_endpoint: login, ..self.clone() })
	}

	/// Joins the scope list with the persistence delimiter.
	pub fn scopes_csv(&self) -> String {
		self.scopes.join(",")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> ProviderConfig {
		ProviderConfig {
			id: ProviderId::new("keycloak-main").expect("Provider id fixture should be valid."),
			title: "Main Keycloak".into(),
			issuer: Url::parse("https://id.example.com/realms/chat")
				.expect("Issuer fixture should parse."),
			token_endpoint: Url::parse(
				"https://id.example.com/realms/chat/protocol/openid-connect/token",
			)
			.expect("Token endpoint fixture should parse."),
			login_endpoint: Url::parse("https://chat.example.com/login/keycloak?return_to=%2F")
				.expect("Login endpoint fixture should parse."),
			client_id: "chat-client".into(),
			redirect_url: Url::parse("https://chat.example.com/auth/keycloak")
				.expect("Redirect fixture should parse."),
			scopes: vec!["openid".into(), "profile".into(), "email".into()],
		}
	}

	#[test]
	fn identifier_rejects_empty_and_oversized_values() {
		assert_eq!(ProviderId::new("  "), Err(ProviderIdError::Empty));
		assert_eq!(ProviderId::new("x".repeat(129)), Err(ProviderIdError::TooLong));
		assert!(ProviderId::new("keycloak").is_ok());
	}

	#[test]
	fn rebind_swaps_authority_and_keeps_the_rest() {
		let config = config();
		let base =
			Url::parse("http://staging.example.com:8080/").expect("Base fixture should parse.");
		let rebound = config
			.rebind_login_endpoint(&base)
			.expect("Rebinding the login endpoint should succeed.");

		assert_eq!(
			rebound.login_endpoint.as_str(),
			"http://staging.example.com:8080/login/keycloak?return_to=%2F",
		);
		// Every other field, the token endpoint included, is untouched.
		assert_eq!(rebound.token_endpoint, config.token_endpoint);
		assert_eq!(rebound.issuer, config.issuer);
		assert_eq!(rebound.scopes, config.scopes);
	}

	#[test]
	fn scopes_join_on_comma_in_declared_order() {
		assert_eq!(config().scopes_csv(), "openid,profile,email");
	}
}
