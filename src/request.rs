//! Request and response values exchanged between callers, the gateway, and transports.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, error::DecodeError};

static NEXT_ATTEMPT_ID: AtomicU64 = AtomicU64::new(1);

/// HTTP methods understood by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `HEAD`
	Head,
	/// `OPTIONS`
	Options,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Head => "HEAD",
			Method::Options => "OPTIONS",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}

	/// Whether the method changes server state and therefore needs a CSRF token.
	pub const fn is_mutating(self) -> bool {
		!matches!(self, Method::Get | Method::Head | Method::Options)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Process-unique identifier attached to each [`RequestAttempt`] for tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);
impl AttemptId {
	fn next() -> Self {
		Self(NEXT_ATTEMPT_ID.fetch_add(1, Ordering::Relaxed))
	}

	/// Returns the raw counter value.
	pub const fn get(self) -> u64 {
		self.0
	}
}
impl Display for AttemptId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "attempt-{}", self.0)
	}
}

/// One logical call routed through the gateway.
///
/// Resends (CSRF retry, post-refresh retry) reuse the same value: authorization and
/// CSRF headers are attached at send time, so a resend always carries the latest
/// session tokens while method, URL, caller headers, and body stay untouched.
#[derive(Clone, Debug)]
pub struct RequestAttempt {
	id: AttemptId,
	/// HTTP method.
	pub method: Method,
	/// Absolute URL or path relative to the configured base URL.
	pub url: String,
	/// Caller-supplied headers.
	pub headers: Vec<(String, String)>,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	auth_endpoint: bool,
}
impl RequestAttempt {
	/// Creates an attempt without headers or body.
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			id: AttemptId::next(),
			method,
			url: url.into(),
			headers: Vec::new(),
			body: None,
			auth_endpoint: false,
		}
	}

	/// Shorthand for a `GET` attempt.
	pub fn get(url: impl Into<String>) -> Self {
		Self::new(Method::Get, url)
	}

	/// Shorthand for a `POST` attempt.
	pub fn post(url: impl Into<String>) -> Self {
		Self::new(Method::Post, url)
	}

	/// Shorthand for a `PUT` attempt.
	pub fn put(url: impl Into<String>) -> Self {
		Self::new(Method::Put, url)
	}

	/// Shorthand for a `PATCH` attempt.
	pub fn patch(url: impl Into<String>) -> Self {
		Self::new(Method::Patch, url)
	}

	/// Shorthand for a `DELETE` attempt.
	pub fn delete(url: impl Into<String>) -> Self {
		Self::new(Method::Delete, url)
	}

	/// Appends a caller header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `content-type`.
	pub fn with_json<T>(self, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value).map_err(Error::Encode)?;

		Ok(self.with_header("content-type", "application/json").with_body(body))
	}

	/// Tags the attempt as targeting login, refresh, or logout.
	///
	/// Tagged attempts never enter the refresh flow or the CSRF retry on their own
	/// failures. The gateway also exempts untagged attempts whose URL matches a configured
	/// session endpoint, but only the tag covers custom auth routes.
	pub fn for_auth_endpoint(mut self) -> Self {
		self.auth_endpoint = true;

		self
	}

	/// Returns the tracing identifier.
	pub fn id(&self) -> AttemptId {
		self.id
	}

	/// Whether the attempt targets an authentication endpoint.
	pub fn is_auth_endpoint(&self) -> bool {
		self.auth_endpoint
	}
}

/// Raw HTTP response; any status, including non-2xx, is a normal value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers with lowercase names.
	pub headers: Vec<(String, String)>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response without headers.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: Vec::new(), body: body.into() }
	}

	/// Creates a JSON response from an in-memory value.
	pub fn json_value(status: u16, value: &serde_json::Value) -> Self {
		Self::new(status, value.to_string()).with_header("content-type", "application/json")
	}

	/// Appends a header, lowercasing its name.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.push((name.as_ref().to_ascii_lowercase(), value.into()));

		self
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the first header value with a case-insensitively matching name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Returns the body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Decodes the body as JSON with path-aware error reporting.
	pub fn json<T>(&self) -> Result<T, DecodeError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DecodeError { status: self.status, source })
	}

	/// Returns the `message` field of a JSON error body, or the raw text otherwise.
	pub fn error_message(&self) -> Option<String> {
		match serde_json::from_slice::<serde_json::Value>(&self.body) {
			Ok(serde_json::Value::Object(map)) =>
				map.get("message").and_then(serde_json::Value::as_str).map(ToOwned::to_owned),
			Ok(serde_json::Value::String(text)) => Some(text),
			Ok(_) => None,
			Err(_) => {
				let text = self.text();
				let trimmed = text.trim();

				(!trimmed.is_empty()).then(|| trimmed.to_owned())
			},
		}
	}

	/// Returns the machine-readable `code` field of a JSON error body.
	pub fn error_code(&self) -> Option<String> {
		let value = serde_json::from_slice::<serde_json::Value>(&self.body).ok()?;

		value.get("code").and_then(serde_json::Value::as_str).map(ToOwned::to_owned)
	}
}
