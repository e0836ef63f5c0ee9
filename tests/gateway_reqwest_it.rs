#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use session_gateway::{
	config::GatewayConfig,
	gateway::{Gateway, ReqwestGateway},
	request::RequestAttempt,
	url::Url,
};

fn build_gateway(server: &MockServer) -> ReqwestGateway {
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let config =
		GatewayConfig::builder(base_url).build().expect("Default configuration should validate.");

	Gateway::connect(config).expect("Reqwest transport should build.")
}

#[tokio::test]
async fn simultaneous_expiries_resend_with_the_refreshed_token() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);
	let csrf = server
		.mock_async(|when, then| {
			when.method(GET).path("/security/csrf-token");
			then.status(200).json_body(json!({ "csrfToken": "t1" }));
		})
		.await;
	let stale = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/events").header("authorization", "Bearer stale-token");
			then.status(401).json_body(json!({ "message": "Access token expired" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.delay(Duration::from_millis(300))
				.json_body(json!({ "accessToken": "new-token", "userId": 11 }));
		})
		.await;
	let mut resent = Vec::new();

	for id in 1..=3 {
		resent.push(
			server
				.mock_async(|when, then| {
					when.method(PUT)
						.path("/api/events")
						.header("authorization", "Bearer new-token")
						.header("x-csrf-token", "t1")
						.body(format!("{{\"id\":{id}}}"));
					then.status(200).json_body(json!({ "id": id }));
				})
				.await,
		);
	}

	gateway.session().set_credentials("stale-token".into(), None);

	let attempts = (1..=3)
		.map(|id| RequestAttempt::put("/api/events").with_body(format!("{{\"id\":{id}}}")))
		.collect::<Vec<_>>();
	let (a, b, c) = tokio::join!(
		gateway.send(&attempts[0]),
		gateway.send(&attempts[1]),
		gateway.send(&attempts[2]),
	);

	for response in [a, b, c] {
		assert_eq!(response.expect("Resent request should complete.").status, 200);
	}

	refresh.assert_calls_async(1).await;
	csrf.assert_calls_async(1).await;
	stale.assert_calls_async(3).await;

	for mock in resent {
		mock.assert_calls_async(1).await;
	}

	assert_eq!(gateway.session().user_id().as_deref(), Some("11"));
}

#[tokio::test]
async fn csrf_mismatch_is_recovered_with_a_fresh_token() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);
	let mismatch = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/items").header("x-csrf-token", "t1");
			then.status(403).json_body(json!({ "message": "Invalid CSRF token" }));
		})
		.await;
	let csrf = server
		.mock_async(|when, then| {
			when.method(GET).path("/security/csrf-token");
			then.status(200).json_body(json!({ "csrfToken": "t2" }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/items")
				.header("x-csrf-token", "t2")
				.header("authorization", "Bearer live-token");
			then.status(201).json_body(json!({ "id": "item-1" }));
		})
		.await;

	gateway.session().set_credentials("live-token".into(), None);
	gateway.session().set_csrf_token(Some("t1".into()));

	let response = gateway
		.send(&RequestAttempt::post("/api/items").with_body("{\"name\":\"retro\"}"))
		.await
		.expect("CSRF retry should complete.");

	assert_eq!(response.status, 201);
	assert_eq!(response.text(), "{\"id\":\"item-1\"}");

	mismatch.assert_calls_async(1).await;
	csrf.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
}

#[tokio::test]
async fn refused_refresh_logs_out_and_returns_original_unauthorized() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/profile");
			then.status(401).json_body(json!({ "message": "Access token expired" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401).json_body(json!({ "message": "Refresh session expired" }));
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/logout");
			then.status(204);
		})
		.await;

	gateway.session().set_credentials("stale-token".into(), Some("u-1".into()));
	gateway.session().set_csrf_token(Some("t1".into()));

	let response = gateway
		.send(&RequestAttempt::get("/api/profile"))
		.await
		.expect("Original response should be returned.");

	assert_eq!(response.status, 401);
	assert_eq!(response.error_message().as_deref(), Some("Access token expired"));

	profile.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	logout.assert_calls_async(1).await;

	assert!(gateway.session().access_token().is_none());
	assert!(gateway.session().csrf_token().is_none());
	assert!(gateway.session().user_id().is_none());
}

#[tokio::test]
async fn rejected_login_returns_immediately_without_refresh() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.header("content-type", "application/json")
				.json_body(json!({ "username": "ada", "password": "wrong" }));
			then.status(401).json_body(json!({ "message": "Bad credentials" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "unexpected" }));
		})
		.await;

	gateway.session().set_csrf_token(Some("t1".into()));

	let response = gateway
		.login(&json!({ "username": "ada", "password": "wrong" }))
		.await
		.expect("Rejected login should be returned as a response.");

	assert_eq!(response.status, 401);
	assert_eq!(response.error_message().as_deref(), Some("Bad credentials"));

	login.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert!(gateway.session().access_token().is_none());
}
