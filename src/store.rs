//! Storage contracts and built-in credential store implementations.

pub mod file;
pub mod memory;

pub use file::EncryptedFileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSet},
	provider::{ProviderConfig, ProviderId},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable string key/value persistence for tokens and provider selection.
///
/// Pure storage with no policy: the interactor exclusively owns when records
/// are read, rewritten, or invalidated. No multi-key transactional guarantee
/// is assumed; readers treat a partially present record as absent.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if any.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Persists or replaces the value stored under `key`.
	fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

	/// Deletes the value stored under `key`; deleting an absent key is a no-op.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Sealed snapshot could not be decrypted (wrong passphrase or corruption).
	#[error("Crypto failure: {message}.")]
	Crypto {
		/// Human-readable error payload.
		message: String,
	},
}

/// Persisted key names for both logical records.
pub mod keys {
	/// OIDC identity token.
	pub const OIDC_ID: &str = "oidc.id";
	/// OIDC access token.
	pub const OIDC_ACCESS: &str = "oidc.access";
	/// Access token expiration, epoch milliseconds as a string.
	pub const OIDC_EXPIRATION: &str = "oidc.expiration";
	/// OIDC refresh token.
	pub const OIDC_REFRESH: &str = "oidc.refresh";

	/// Selected provider identifier.
	pub const SSO_ID: &str = "sso.id";
	/// Selected provider display title.
	pub const SSO_TITLE: &str = "sso.title";
	/// Selected provider issuer base URL.
	pub const SSO_ENDPOINT: &str = "sso.endpoint";
	/// Selected provider token endpoint URL.
	pub const SSO_TOKEN_ENDPOINT: &str = "sso.token.endpoint";
	/// Selected provider interactive login URL.
	pub const SSO_LOGIN_URI: &str = "sso.login.uri";
	/// Selected provider OAuth client identifier.
	pub const SSO_CLIENT_ID: &str = "sso.client.id";
	/// Selected provider redirect target.
	pub const SSO_REDIRECT_URL: &str = "sso.redirect.url";
	/// Selected provider scopes, comma-joined.
	pub const SSO_SCOPES: &str = "sso.scopes";

	/// Every token-set key, in write order.
	pub const TOKEN_SET: [&str; 4] = [OIDC_ID, OIDC_ACCESS, OIDC_EXPIRATION, OIDC_REFRESH];
	/// Every provider key, in write order.
	pub const PROVIDER: [&str; 8] = [
		SSO_ID,
		SSO_TITLE,
		SSO_ENDPOINT,
		SSO_TOKEN_ENDPOINT,
		SSO_LOGIN_URI,
		SSO_CLIENT_ID,
		SSO_REDIRECT_URL,
		SSO_SCOPES,
	];
}

/// Record codecs mapping typed values onto the flat key/value store.
///
/// Readers return `Ok(None)` whenever any required key is missing or any
/// persisted value no longer parses; a half-written or corrupted record must
/// read as absent, never as an error or a partially populated object.
pub mod records {
	// self
	use super::*;

	/// Reads the persisted token set, if fully present and parseable.
	pub async fn load_token_set(store: &dyn CredentialStore) -> Result<Option<TokenSet>, StoreError> {
		let Some(id_token) = store.get(keys::OIDC_ID).await? else { return Ok(None) };
		let Some(access_token) = store.get(keys::OIDC_ACCESS).await? else { return Ok(None) };
		let Some(expiration) = store.get(keys::OIDC_EXPIRATION).await? else { return Ok(None) };
		let Some(refresh_token) = store.get(keys::OIDC_REFRESH).await? else { return Ok(None) };
		let Some(expires_at) = parse_epoch_millis(&expiration) else { return Ok(None) };

		Ok(Some(TokenSet {
			id_token: TokenSecret::new(id_token),
			access_token: TokenSecret::new(access_token),
			expires_at,
			refresh_token: TokenSecret::new(refresh_token),
		}))
	}

	/// Overwrites the persisted token set wholesale.
	pub async fn save_token_set(
		store: &dyn CredentialStore,
		token_set: &TokenSet,
	) -> Result<(), StoreError> {
		let millis = epoch_millis(token_set.expires_at);

		store.put(keys::OIDC_ID, token_set.id_token.expose()).await?;
		store.put(keys::OIDC_ACCESS, token_set.access_token.expose()).await?;
		store.put(keys::OIDC_EXPIRATION, &millis).await?;
		store.put(keys::OIDC_REFRESH, token_set.refresh_token.expose()).await?;

		Ok(())
	}

	/// Deletes every token-set key.
	pub async fn clear_token_set(store: &dyn CredentialStore) -> Result<(), StoreError> {
		for key in keys::TOKEN_SET {
			store.remove(key).await?;
		}

		Ok(())
	}

	/// Reads the selected provider config, if fully present and parseable.
	pub async fn load_provider(
		store: &dyn CredentialStore,
	) -> Result<Option<ProviderConfig>, StoreError> {
		let Some(id) = store.get(keys::SSO_ID).await? else { return Ok(None) };
		let Some(title) = store.get(keys::SSO_TITLE).await? else { return Ok(None) };
		let Some(issuer) = store.get(keys::SSO_ENDPOINT).await? else { return Ok(None) };
		let Some(token_endpoint) = store.get(keys::SSO_TOKEN_ENDPOINT).await? else {
			return Ok(None);
		};
		let Some(login_endpoint) = store.get(keys::SSO_LOGIN_URI).await? else { return Ok(None) };
		let Some(client_id) = store.get(keys::SSO_CLIENT_ID).await? else { return Ok(None) };
		let Some(redirect_url) = store.get(keys::SSO_REDIRECT_URL).await? else { return Ok(None) };
		let Some(scopes) = store.get(keys::SSO_SCOPES).await? else { return Ok(None) };
		let Ok(id) = ProviderId::new(&id) else { return Ok(None) };
		let (Ok(issuer), Ok(token_endpoint), Ok(login_endpoint), Ok(redirect_url)) = (
			Url::parse(&issuer),
			Url::parse(&token_endpoint),
			Url::parse(&login_endpoint),
			Url::parse(&redirect_url),
		) else {
			return Ok(None);
		};
		let scopes = if scopes.is_empty() {
			Vec::new()
		} else {
			scopes.split(',').map(str::to_owned).collect()
		};

		Ok(Some(ProviderConfig {
			id,
			title,
			issuer,
			token_endpoint,
			login_endpoint,
			client_id,
			redirect_url,
			scopes,
		}))
	}

	/// Overwrites the selected provider record wholesale.
	pub async fn save_provider(
		store: &dyn CredentialStore,
		provider: &ProviderConfig,
	) -> Result<(), StoreError> {
		store.put(keys::SSO_ID, &provider.id).await?;
		store.put(keys::SSO_TITLE, &provider.title).await?;
		store.put(keys::SSO_ENDPOINT, provider.issuer.as_str()).await?;
		store.put(keys::SSO_TOKEN_ENDPOINT, provider.token_endpoint.as_str()).await?;
		store.put(keys::SSO_LOGIN_URI, provider.login_endpoint.as_str()).await?;
		store.put(keys::SSO_CLIENT_ID, &provider.client_id).await?;
		store.put(keys::SSO_REDIRECT_URL, provider.redirect_url.as_str()).await?;
		store.put(keys::SSO_SCOPES, &provider.scopes_csv()).await?;

		Ok(())
	}

	/// Deletes every provider key.
	pub async fn clear_provider(store: &dyn CredentialStore) -> Result<(), StoreError> {
		for key in keys::PROVIDER {
			store.remove(key).await?;
		}

		Ok(())
	}

	fn epoch_millis(instant: OffsetDateTime) -> String {
		let millis = instant.unix_timestamp_nanos() / 1_000_000;

		millis.to_string()
	}

	fn parse_epoch_millis(value: &str) -> Option<OffsetDateTime> {
		let millis: i128 = value.parse().ok()?;

		OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn token_set_round_trips_through_epoch_millis() {
		let store = MemoryStore::default();
		let expires_at = OffsetDateTime::from_unix_timestamp(1_750_000_000)
			.expect("Expiry fixture should be representable.");
		let token_set = TokenSet::new("id-token", "access-token", expires_at, "refresh-token");

		records::save_token_set(&store, &token_set)
			.await
			.expect("Saving the token set should succeed.");

		let loaded = records::load_token_set(&store)
			.await
			.expect("Loading the token set should succeed.")
			.expect("Token set should be present after save.");

		assert_eq!(loaded, token_set);
	}

	#[tokio::test]
	async fn missing_single_key_reads_as_absent() {
		let store = MemoryStore::default();
		let token_set =
			TokenSet::new("id", "access", OffsetDateTime::now_utc(), "refresh");

		records::save_token_set(&store, &token_set)
			.await
			.expect("Saving the token set should succeed.");

		for key in keys::TOKEN_SET {
			store.put(key, "restore-me").await.expect("Seeding key should succeed.");
		}
		store.put(keys::OIDC_EXPIRATION, "123456789").await.expect("Reseed should succeed.");
		store.remove(keys::OIDC_REFRESH).await.expect("Removing one key should succeed.");

		let loaded =
			records::load_token_set(&store).await.expect("Loading the token set should succeed.");

		assert!(loaded.is_none(), "A token set missing one key must read as absent.");
	}

	#[tokio::test]
	async fn corrupted_expiration_reads_as_absent() {
		let store = MemoryStore::default();

		for key in keys::TOKEN_SET {
			store.put(key, "value").await.expect("Seeding key should succeed.");
		}
		store
			.put(keys::OIDC_EXPIRATION, "not-a-number")
			.await
			.expect("Seeding corrupted key should succeed.");

		let loaded =
			records::load_token_set(&store).await.expect("Loading the token set should succeed.");

		assert!(loaded.is_none());
	}
}
