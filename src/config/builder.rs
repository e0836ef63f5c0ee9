// self
use crate::{
	_prelude::*,
	config::{CsrfMismatchRule, GatewayConfig, SessionEndpoints},
};

/// Errors raised while constructing or validating a [`GatewayConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum GatewayConfigError {
	/// Base URL must be HTTP(S) so transports can dial it.
	#[error("The base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Base URL that failed validation.
		url: String,
	},
	/// Endpoint paths must be absolute paths on the base URL's origin.
	#[error("The {endpoint} endpoint must be a non-empty path starting with '/': {path:?}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
	},
	/// CSRF header must be a valid HTTP header name.
	#[error("The CSRF header name is not a valid HTTP token: {name:?}.")]
	InvalidHeaderName {
		/// Header name that failed validation.
		name: String,
	},
	/// An empty marker would match every 403.
	#[error("The CSRF mismatch marker must not be empty.")]
	EmptyMismatchMarker,
}

/// Builder for [`GatewayConfig`] values; also the shape accepted by
/// [`GatewayConfig::from_json`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfigBuilder {
	/// Base URL that relative attempt URLs are joined onto.
	pub base_url: Url,
	/// Session endpoint paths.
	#[serde(default)]
	pub endpoints: SessionEndpoints,
	/// Header carrying the CSRF token.
	#[serde(default = "default_csrf_header")]
	pub csrf_header: String,
	/// CSRF-mismatch detection rule.
	#[serde(default)]
	pub csrf_mismatch: CsrfMismatchRule,
}
impl GatewayConfigBuilder {
	/// Creates a new builder seeded with the default endpoints.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: SessionEndpoints::default(),
			csrf_header: default_csrf_header(),
			csrf_mismatch: CsrfMismatchRule::default(),
		}
	}

	/// Overrides every endpoint path at once.
	pub fn endpoints(mut self, endpoints: SessionEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Sets the login endpoint path.
	pub fn login_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Sets the refresh endpoint path.
	pub fn refresh_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Sets the logout endpoint path.
	pub fn logout_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.logout = path.into();

		self
	}

	/// Sets the CSRF provisioning endpoint path.
	pub fn csrf_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.csrf_token = path.into();

		self
	}

	/// Sets the header carrying the CSRF token.
	pub fn csrf_header(mut self, name: impl Into<String>) -> Self {
		self.csrf_header = name.into();

		self
	}

	/// Overrides the CSRF-mismatch detection rule.
	pub fn csrf_mismatch(mut self, rule: CsrfMismatchRule) -> Self {
		self.csrf_mismatch = rule;

		self
	}

	/// Validates the configuration and produces a [`GatewayConfig`].
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		self.validate()?;

		Ok(GatewayConfig {
			base_url: self.base_url,
			endpoints: self.endpoints,
			csrf_header: self.csrf_header.to_ascii_lowercase(),
			csrf_mismatch: self.csrf_mismatch,
		})
	}

	fn validate(&self) -> Result<(), GatewayConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(GatewayConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}

		for (endpoint, path) in [
			("login", &self.endpoints.login),
			("refresh", &self.endpoints.refresh),
			("logout", &self.endpoints.logout),
			("csrf_token", &self.endpoints.csrf_token),
		] {
			if path.len() < 2 || !path.starts_with('/') {
				return Err(GatewayConfigError::InvalidEndpoint { endpoint, path: path.clone() });
			}
		}

		if !is_header_token(&self.csrf_header) {
			return Err(GatewayConfigError::InvalidHeaderName { name: self.csrf_header.clone() });
		}
		if self.csrf_mismatch.marker.trim().is_empty() {
			return Err(GatewayConfigError::EmptyMismatchMarker);
		}

		Ok(())
	}
}

fn default_csrf_header() -> String {
	GatewayConfig::DEFAULT_CSRF_HEADER.into()
}

// RFC 9110 `token` characters.
fn is_header_token(name: &str) -> bool {
	!name.is_empty()
		&& name.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}
