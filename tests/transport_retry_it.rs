// self
use oidc_conduit::{
	_preludet::*,
	error::TransportError,
	http::BufferedResponse,
	interactor::AuthInteractor,
	store::{MemoryStore, records},
	transport::{AuthenticatedTransport, RequestOptions},
};

fn url(path: &str) -> Url {
	Url::parse(&format!("https://chat.example.com{path}")).expect("Test URL should parse.")
}

fn anonymous_transport(
	script: Vec<Result<BufferedResponse, TransportError>>,
) -> (AuthenticatedTransport, Arc<ScriptedHttpClient>) {
	let http = Arc::new(ScriptedHttpClient::new(script));
	let launcher = Arc::new(ScriptedLauncher::new(ScriptedLaunch::Pending));
	let interactor =
		Arc::new(AuthInteractor::new(Arc::new(MemoryStore::default()), http.clone(), launcher));

	(AuthenticatedTransport::new(http.clone(), interactor), http)
}

#[tokio::test]
async fn retry_returns_the_first_success() {
	let (transport, http) = anonymous_transport(vec![
		Ok(ScriptedHttpClient::response(500, "worker restarting")),
		Ok(ScriptedHttpClient::response(500, "worker restarting")),
		Ok(ScriptedHttpClient::response(200, "{\"ok\":true}")),
	]);
	let response = transport
		.retry_request(url("/api/v1/rooms"), 2, RequestOptions::default())
		.await
		.expect("The third attempt should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(http.requests().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_return_the_last_failing_response() {
	let (transport, http) = anonymous_transport(vec![
		Ok(ScriptedHttpClient::response(500, "first")),
		Ok(ScriptedHttpClient::response(503, "second")),
		Ok(ScriptedHttpClient::response(500, "third")),
	]);
	let response = transport
		.retry_request(url("/api/v1/rooms"), 2, RequestOptions::default())
		.await
		.expect("Exhausted transient retries should yield the failing response.");

	assert_eq!(response.status, 500);
	assert_eq!(response.text(), "third");
	assert_eq!(http.requests().len(), 3);
}

#[tokio::test]
async fn non_retryable_statuses_return_immediately() {
	let (transport, http) = anonymous_transport(vec![
		Ok(ScriptedHttpClient::response(404, "no such room")),
		Ok(ScriptedHttpClient::response(200, "never reached")),
	]);
	let response = transport
		.retry_request(url("/api/v1/rooms/missing"), 3, RequestOptions::default())
		.await
		.expect("Non-retryable statuses are returned, not raised.");

	assert_eq!(response.status, 404);
	assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn transport_failures_surface_only_on_the_final_attempt() {
	let (transport, http) = anonymous_transport(vec![
		Err(ScriptedHttpClient::failure()),
		Err(ScriptedHttpClient::failure()),
	]);
	let err = transport
		.retry_request(url("/api/v1/rooms"), 1, RequestOptions::default())
		.await
		.expect_err("A transport failure on the final attempt should propagate.");

	assert!(matches!(err, Error::Transport(_)));
	assert_eq!(http.requests().len(), 2);
}

#[tokio::test]
async fn anonymous_mode_sends_no_authorization_and_reads_no_store() {
	let store = Arc::new(CountingStore::default());
	let http = Arc::new(ScriptedHttpClient::new(vec![Ok(ScriptedHttpClient::response(
		200,
		"{\"rooms\":[]}",
	))]));
	let launcher = Arc::new(ScriptedLauncher::new(ScriptedLaunch::Pending));
	let interactor = Arc::new(AuthInteractor::new(store.clone(), http.clone(), launcher));
	let transport = AuthenticatedTransport::new(http.clone(), interactor);
	let response = transport
		.get(url("/api/v1/rooms"), RequestOptions::default())
		.await
		.expect("Anonymous requests should dispatch.");

	assert_eq!(response.status, 200);
	assert_eq!(store.ops(), 0);

	let requests = http.requests();

	assert!(requests[0].headers.iter().all(|(name, _)| name != "authorization"));
}

#[tokio::test]
async fn fresh_cached_tokens_become_bearer_headers() {
	let store = Arc::new(MemoryStore::default());
	let http = Arc::new(ScriptedHttpClient::new(vec![Ok(ScriptedHttpClient::response(200, "{}"))]));
	let launcher = Arc::new(ScriptedLauncher::new(ScriptedLaunch::Pending));
	let interactor = test_interactor(store.clone(), http.clone(), launcher);

	records::save_token_set(store.as_ref(), &test_token_set(Duration::hours(1)))
		.await
		.expect("Token set record should persist into the store.");

	let transport = AuthenticatedTransport::new(http.clone(), interactor);

	transport
		.get(url("/api/v1/rooms"), RequestOptions::default())
		.await
		.expect("Authenticated requests should dispatch.");

	let requests = http.requests();
	let authorization = requests[0]
		.headers
		.iter()
		.find(|(name, _)| name == "authorization")
		.map(|(_, value)| value.clone())
		.expect("A fresh cached token should be attached as a bearer header.");

	assert_eq!(authorization, "Bearer access-token");
}
