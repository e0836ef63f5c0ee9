//! Demonstrates driving the gateway over a custom, in-process transport.
//!
//! 1. Implement [`HttpTransport`] for any type that can turn an [`OutboundRequest`] into an
//!    [`ApiResponse`]; non-2xx statuses are ordinary responses.
//! 2. Wrap it in `Arc` and pass it to [`Gateway::new`].
//! 3. Fire concurrent requests with an expired token and watch them share a single refresh.

// std
use std::{
	io,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use color_eyre::Result;
use serde_json::json;
use url::Url;
// self
use session_gateway::{
	config::GatewayConfig,
	error::TransportError,
	gateway::Gateway,
	http::{HttpTransport, OutboundRequest, TransportFuture},
	request::{ApiResponse, RequestAttempt},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = GatewayConfig::builder(Url::parse("https://api.example.com/")?).build()?;
	let transport = Arc::new(MockBackend::default());
	let gateway = Gateway::new(config, transport.clone());

	gateway.session().set_credentials("expired-token".into(), None);

	let attempt = RequestAttempt::get("/api/dashboard");
	let (a, b, c) =
		tokio::join!(gateway.send(&attempt), gateway.send(&attempt), gateway.send(&attempt));

	for response in [a?, b?, c?] {
		println!("Dashboard answered {}: {}.", response.status, response.text());
	}

	println!(
		"Refresh exchanges dispatched: {}; callers that joined one in flight: {}.",
		gateway.refresh_metrics().exchanges(),
		gateway.refresh_metrics().joined()
	);

	match gateway.send(&RequestAttempt::get("/api/offline")).await {
		Ok(response) => println!("Offline endpoint unexpectedly answered {}.", response.status),
		Err(e) => println!("Transport failure surfaced to the caller: {e}."),
	}

	gateway.logout().await;

	println!("Session status after sign-out: {:?}.", gateway.status());

	Ok(())
}

#[derive(Default)]
struct MockBackend {
	refreshes: AtomicUsize,
}
impl MockBackend {
	async fn respond(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
		let fresh = request.header("authorization") == Some("Bearer fresh-token");

		match request.url.path() {
			"/security/csrf-token" =>
				Ok(ApiResponse::json_value(200, &json!({ "csrfToken": "demo-csrf" }))),
			"/auth/refresh" => {
				tokio::time::sleep(Duration::from_millis(50)).await;
				self.refreshes.fetch_add(1, Ordering::SeqCst);

				Ok(ApiResponse::json_value(
					200,
					&json!({ "accessToken": "fresh-token", "userId": "demo" }),
				))
			},
			"/auth/logout" => Ok(ApiResponse::new(204, Vec::new())),
			"/api/offline" => Err(TransportError::network(
				request.url.as_str(),
				io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
			)),
			_ if fresh => Ok(ApiResponse::json_value(200, &json!({ "widgets": 3 }))),
			_ => Ok(ApiResponse::json_value(401, &json!({ "message": "Access token expired" }))),
		}
	}
}
impl HttpTransport for MockBackend {
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(self.respond(request))
	}
}
