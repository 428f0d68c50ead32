//! OIDC credential keeper and authenticated HTTP transport for chat
//! clients—token caching, refresh-or-reauthenticate fallback, bounded retry,
//! and NDJSON streaming in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod http;
pub mod interactor;
pub mod obs;
pub mod provider;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Scripted fakes and fixture builders for integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;
	pub use futures::StreamExt;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		auth::TokenSet,
		error::TransportError,
		http::{BufferedResponse, HttpClient, HttpFuture, OutboundRequest, StreamingResponse},
		interactor::{AuthInteractor, AuthorizationOutcome, LaunchFuture, LoginLauncher},
		provider::{ProviderConfig, ProviderId},
		store::{CredentialStore, MemoryStore, StoreFuture},
	};

	/// Builds a provider config whose endpoints live under `base`.
	pub fn test_provider(base: &str) -> ProviderConfig {
		let url = |suffix: &str| {
			Url::parse(&format!("{base}{suffix}")).expect("Test provider URL should parse.")
		};

		ProviderConfig {
			id: ProviderId::new("test-provider").expect("Test provider id should be valid."),
			title: "Test Provider".into(),
			issuer: url("/realms/chat"),
			token_endpoint: url("/realms/chat/protocol/openid-connect/token"),
			login_endpoint: url("/login/test-provider"),
			client_id: "chat-client".into(),
			redirect_url: url("/auth/test-provider"),
			scopes: vec!["openid".into(), "profile".into()],
		}
	}

	/// Builds a complete token set expiring `expires_in` from now.
	pub fn test_token_set(expires_in: Duration) -> TokenSet {
		TokenSet::new(
			"id-token",
			"access-token",
			OffsetDateTime::now_utc() + expires_in,
			"refresh-token",
		)
	}

	/// Store wrapper counting every operation, for "never touches storage"
	/// assertions.
	#[derive(Default)]
	pub struct CountingStore {
		inner: MemoryStore,
		ops: AtomicUsize,
	}
	impl CountingStore {
		/// Number of store operations performed so far.
		pub fn ops(&self) -> usize {
			self.ops.load(Ordering::Relaxed)
		}
	}
	impl CredentialStore for CountingStore {
		fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
			self.ops.fetch_add(1, Ordering::Relaxed);

			self.inner.get(key)
		}

		fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
			self.ops.fetch_add(1, Ordering::Relaxed);

			self.inner.put(key, value)
		}

		fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
			self.ops.fetch_add(1, Ordering::Relaxed);

			self.inner.remove(key)
		}
	}

	/// [`HttpClient`] fake answering from a fixed script, recording requests.
	#[derive(Default)]
	pub struct ScriptedHttpClient {
		script: Mutex<VecDeque<Result<BufferedResponse, TransportError>>>,
		requests: Mutex<Vec<OutboundRequest>>,
	}
	impl ScriptedHttpClient {
		/// Creates a client that replays `script` front to back.
		pub fn new(script: Vec<Result<BufferedResponse, TransportError>>) -> Self {
			Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
		}

		/// Builds a buffered response fixture.
		pub fn response(status: u16, body: &str) -> BufferedResponse {
			BufferedResponse {
				status,
				headers: Vec::new(),
				body: Bytes::from(body.to_owned()),
			}
		}

		/// Builds a scripted transport failure.
		pub fn failure() -> TransportError {
			TransportError::Io(std::io::Error::other("scripted transport failure"))
		}

		/// Clones the requests recorded so far.
		pub fn requests(&self) -> Vec<OutboundRequest> {
			self.requests.lock().clone()
		}
	}
	impl HttpClient for ScriptedHttpClient {
		fn execute(&self, request: OutboundRequest) -> HttpFuture<'_, BufferedResponse> {
			self.requests.lock().push(request);

			let next = self.script.lock().pop_front();

			Box::pin(async move {
				next.unwrap_or_else(|| {
					Err(TransportError::Io(std::io::Error::other("script exhausted")))
				})
			})
		}

		fn open_stream(&self, request: OutboundRequest) -> HttpFuture<'_, StreamingResponse> {
			self.requests.lock().push(request);

			Box::pin(async move {
				Err(TransportError::Io(std::io::Error::other("streaming is not scripted")))
			})
		}
	}

	/// Behavior replayed by a [`ScriptedLauncher`] on every launch.
	#[derive(Clone, Debug)]
	pub enum ScriptedLaunch {
		/// Resolve with a complete token set.
		Complete(TokenSet),
		/// Report the redirect as started but unfinished.
		Pending,
		/// Fail with the given reason.
		Fail(String),
	}

	/// [`LoginLauncher`] fake with a fixed behavior and a launch counter.
	pub struct ScriptedLauncher {
		behavior: ScriptedLaunch,
		launches: AtomicUsize,
	}
	impl ScriptedLauncher {
		/// Creates a launcher replaying `behavior` on every call.
		pub fn new(behavior: ScriptedLaunch) -> Self {
			Self { behavior, launches: AtomicUsize::new(0) }
		}

		/// Number of times the launcher was invoked.
		pub fn launches(&self) -> usize {
			self.launches.load(Ordering::Relaxed)
		}
	}
	impl LoginLauncher for ScriptedLauncher {
		fn launch<'a>(&'a self, _provider: &'a ProviderConfig) -> LaunchFuture<'a> {
			self.launches.fetch_add(1, Ordering::Relaxed);

			let behavior = self.behavior.clone();

			Box::pin(async move {
				match behavior {
					ScriptedLaunch::Complete(token_set) =>
						Ok(AuthorizationOutcome::Completed(token_set)),
					ScriptedLaunch::Pending => Ok(AuthorizationOutcome::Pending),
					ScriptedLaunch::Fail(reason) => Err(Error::AuthorizationFailed { reason }),
				}
			})
		}
	}

	/// Constructs an interactor over the provided fakes with auth enabled.
	pub fn test_interactor(
		store: Arc<dyn CredentialStore>,
		http: Arc<dyn HttpClient>,
		launcher: Arc<dyn LoginLauncher>,
	) -> Arc<AuthInteractor> {
		Arc::new(AuthInteractor::new(store, http, launcher).with_auth_enabled(true))
	}

	/// Builds a reqwest HTTP client pair that accepts the self-signed
	/// certificates produced by `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> crate::http::ReqwestHttpClient {
		let insecure = || {
			ReqwestClient::builder()
				.danger_accept_invalid_certs(true)
				.danger_accept_invalid_hostnames(true)
		};
		let plain = insecure()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");
		let streaming =
			insecure().build().expect("Failed to build insecure Reqwest client for tests.");

		crate::http::ReqwestHttpClient::with_clients(plain, streaming)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use bytes::Bytes;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, oidc_conduit as _};
