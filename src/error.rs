//! Gateway-level error types shared across the executor, coordinators, and configuration.
//!
//! Non-2xx HTTP statuses are never errors here; they travel to the caller as
//! [`ApiResponse`](crate::request::ApiResponse) values so upstream message parsing keeps working.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded into the expected shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	Encode(#[source] serde_json::Error),
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Gateway configuration failed validation.
	#[error(transparent)]
	InvalidConfig(#[from] crate::config::GatewayConfigError),
	/// Gateway configuration JSON could not be parsed.
	#[error("Gateway configuration is malformed.")]
	ConfigParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request URL cannot be resolved against the base URL.
	#[error("Request URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL as supplied by the caller.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{url}`.")]
	Network {
		/// Target URL, when known.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during the HTTP exchange.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		url: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		let url = e.url().map(ToString::to_string).unwrap_or_default();

		Self::network(url, e)
	}
}

/// Response payload did not match the expected JSON shape.
#[derive(Debug, ThisError)]
#[error("Response body (status {status}) is malformed at `{}`.", .source.path())]
pub struct DecodeError {
	/// HTTP status of the response that failed to decode.
	pub status: u16,
	/// Structured parsing failure.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}
