#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oidc_conduit::{
	_preludet::*,
	error::StreamError,
	store::{MemoryStore, records},
	transport::{AuthenticatedTransport, ChatChunk},
};

const CHAT_PATH: &str = "/api/v1/rooms/42/chat";

async fn build_transport(server: &MockServer, expires_in: Duration) -> AuthenticatedTransport {
	let store = Arc::new(MemoryStore::default());
	let http = Arc::new(test_reqwest_http_client());
	let launcher = Arc::new(ScriptedLauncher::new(ScriptedLaunch::Pending));

	records::save_provider(store.as_ref(), &test_provider(&server.base_url()))
		.await
		.expect("Provider record should persist into the store.");
	records::save_token_set(store.as_ref(), &test_token_set(expires_in))
		.await
		.expect("Token set record should persist into the store.");

	AuthenticatedTransport::new(http.clone(), test_interactor(store, http, launcher))
}

fn chat_url(server: &MockServer) -> Url {
	Url::parse(&server.url(CHAT_PATH)).expect("Chat URL should parse.")
}

#[tokio::test]
async fn post_stream_decodes_chunks_in_transmission_order() {
	let server = MockServer::start_async().await;
	let transport = build_transport(&server, Duration::hours(1)).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(CHAT_PATH)
				.header("authorization", "Bearer access-token")
				.header("content-type", "application/json")
				.body("{\"text\":\"hello\"}");
			then.status(200).header("content-type", "application/json").body(concat!(
				"{\"role\":\"model\",\"content\":\"Hel\",\"timestamp\":\"2026-01-01T00:00:00Z\"}\n",
				"{\"role\":\"model\",\"content\":\"lo \",\"timestamp\":\"2026-01-01T00:00:01Z\"}\n",
				"{\"role\":\"model\",\"content\":\"there\",\"timestamp\":\"2026-01-01T00:00:02Z\"}\n",
			));
		})
		.await;
	let stream =
		transport.post_stream::<ChatChunk, _, _>(chat_url(&server), "hello", |chunk| chunk.content);
	let chunks = stream.collect::<Vec<_>>().await;

	mock.assert_async().await;

	let answer = chunks
		.into_iter()
		.collect::<Result<Vec<_>>>()
		.expect("Every streamed chunk should decode.")
		.concat();

	assert_eq!(answer, "Hello there");
}

#[tokio::test]
async fn post_stream_surfaces_error_statuses_with_a_preview() {
	let server = MockServer::start_async().await;
	let transport = build_transport(&server, Duration::hours(1)).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(CHAT_PATH);
			then.status(503).body("model backend overloaded");
		})
		.await;
	let stream = transport.post_stream::<ChatChunk, _, _>(chat_url(&server), "hello", |chunk| chunk);
	let chunks = stream.collect::<Vec<_>>().await;

	mock.assert_async().await;

	assert_eq!(chunks.len(), 1);

	let Err(Error::Stream(StreamError::Status { status, body_preview })) = &chunks[0] else {
		panic!("A non-2xx chat response should end the stream with a status error.");
	};

	assert_eq!(*status, 503);
	assert_eq!(body_preview, "model backend overloaded");
}
