//! Transport primitives and the session-aware request executor.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack: it performs one raw
//! exchange and reports any status as a normal [`ApiResponse`]. [`RequestExecutor`] sits on
//! top of it, resolves attempt URLs against the configured base URL, and stamps the current
//! bearer and CSRF tokens from the [`SessionStore`] onto every outbound request. Neither
//! layer interprets status codes; that belongs to the [`Gateway`](crate::gateway::Gateway).

// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	error::TransportError,
	request::{ApiResponse, Method, RequestAttempt},
	session::SessionStore,
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Header carrying the bearer credential.
pub const AUTHORIZATION: &str = "authorization";

/// Fully resolved request handed to an [`HttpTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Headers in send order; names are lowercase for session-supplied entries.
	pub headers: Vec<(String, String)>,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl OutboundRequest {
	/// Returns the first header value with a case-insensitively matching name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	fn set_header(&mut self, name: &str, value: String) {
		self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
		self.headers.push((name.to_owned(), value));
	}
}

/// Abstraction over HTTP stacks capable of performing a single exchange.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// executor and every coordinator, and the returned futures must be `Send` so gateway
/// calls can hop executor threads. Non-2xx statuses are successful exchanges; only
/// failures to obtain a response at all are [`TransportError`]s.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Performs the exchange.
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The refresh endpoint authenticates through a session cookie, so production gateways
/// should use [`ReqwestTransport::with_cookie_store`] (or pass a client with its cookie
/// store enabled).
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that keeps cookies across calls.
	pub fn with_cookie_store() -> Result<Self> {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let OutboundRequest { method, url, headers, body } = request;
			let mut builder = client.request(method.into(), url);

			for (name, value) in headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok::<_, TransportError>(ApiResponse { status, headers, body })
		})
	}
}
#[cfg(feature = "reqwest")]
impl From<Method> for reqwest::Method {
	fn from(method: Method) -> Self {
		match method {
			Method::Get => reqwest::Method::GET,
			Method::Head => reqwest::Method::HEAD,
			Method::Options => reqwest::Method::OPTIONS,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}

/// Stateless executor that attaches session tokens and performs one exchange.
pub struct RequestExecutor<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	session: Arc<SessionStore>,
	config: Arc<GatewayConfig>,
}
impl<T> RequestExecutor<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an executor over the shared transport, session, and configuration.
	pub fn new(
		transport: Arc<T>,
		session: Arc<SessionStore>,
		config: Arc<GatewayConfig>,
	) -> Self {
		Self { transport, session, config }
	}

	/// Returns the configuration the executor resolves URLs with.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Returns the shared session store.
	pub fn session(&self) -> &Arc<SessionStore> {
		&self.session
	}

	/// Builds the outbound request for `attempt` with the current session tokens.
	///
	/// Session tokens replace caller headers of the same name.
	pub fn prepare(&self, attempt: &RequestAttempt) -> Result<OutboundRequest> {
		let url = self.config.resolve(&attempt.url)?;
		let mut request = OutboundRequest {
			method: attempt.method,
			url,
			headers: attempt.headers.clone(),
			body: attempt.body.clone(),
		};
		let snapshot = self.session.snapshot();

		if let Some(token) = snapshot.access_token {
			request.set_header(AUTHORIZATION, token.bearer());
		}
		if let Some(token) = snapshot.csrf_token {
			request.set_header(&self.config.csrf_header, token.expose().to_owned());
		}

		Ok(request)
	}

	/// Sends `attempt` and returns the raw response, whatever its status.
	pub async fn execute(&self, attempt: &RequestAttempt) -> Result<ApiResponse> {
		let request = self.prepare(attempt)?;

		Ok(self.transport.send(request).await?)
	}
}
impl<T> Clone for RequestExecutor<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			session: self.session.clone(),
			config: self.config.clone(),
		}
	}
}
impl<T> Debug for RequestExecutor<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("base_url", &self.config.base_url.as_str())
			.field("session", &self.session)
			.finish()
	}
}
