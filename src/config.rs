//! Gateway configuration: base URL, session endpoints, and CSRF conventions.

mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError, request::ApiResponse};

/// Paths of the server endpoints the gateway talks to on its own behalf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionEndpoints {
	/// Credential exchange (`POST`).
	pub login: String,
	/// Session-cookie backed access-token refresh (`POST`, no body).
	pub refresh: String,
	/// Server-side sign-out (`POST`, no body).
	pub logout: String,
	/// CSRF token provisioning (`GET`).
	pub csrf_token: String,
}
impl Default for SessionEndpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			refresh: "/auth/refresh".into(),
			logout: "/auth/logout".into(),
			csrf_token: "/security/csrf-token".into(),
		}
	}
}

/// Detects the server's CSRF-mismatch signal on `403` responses.
///
/// The server reports a mismatch through free-form message text, so the default rule is a
/// case-insensitive substring match on the body's `message`. That is fragile (unrelated
/// messages containing the marker match, translated messages do not); set
/// [`error_code`](Self::error_code) when the server also emits a machine-readable `code`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CsrfMismatchRule {
	/// Substring looked up, case-insensitively, in the error message.
	pub marker: String,
	/// Exact `code` value that also signals a mismatch.
	pub error_code: Option<String>,
}
impl CsrfMismatchRule {
	/// Whether `response` is a CSRF-mismatch rejection.
	pub fn matches(&self, response: &ApiResponse) -> bool {
		if response.status != 403 {
			return false;
		}
		if let Some(expected) = self.error_code.as_deref()
			&& response.error_code().as_deref() == Some(expected)
		{
			return true;
		}

		let marker = self.marker.to_ascii_lowercase();

		response
			.error_message()
			.is_some_and(|message| message.to_ascii_lowercase().contains(&marker))
	}
}
impl Default for CsrfMismatchRule {
	fn default() -> Self {
		Self { marker: "csrf".into(), error_code: None }
	}
}

/// Validated gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
	/// Base URL that relative attempt URLs are joined onto.
	pub base_url: Url,
	/// Session endpoint paths.
	pub endpoints: SessionEndpoints,
	/// Header carrying the CSRF token.
	pub csrf_header: String,
	/// CSRF-mismatch detection rule.
	pub csrf_mismatch: CsrfMismatchRule,
}
impl GatewayConfig {
	/// Default CSRF header name.
	pub const DEFAULT_CSRF_HEADER: &'static str = "x-csrf-token";

	/// Starts a builder for the provided base URL.
	pub fn builder(base_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON document; omitted fields take their defaults.
	pub fn from_json(raw: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let builder: GatewayConfigBuilder = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::ConfigParse { source })?;

		Ok(builder.build().map_err(ConfigError::from)?)
	}

	/// Resolves an attempt URL (absolute, or relative to the base URL).
	pub fn resolve(&self, url: &str) -> Result<Url> {
		let resolved = match Url::parse(url) {
			Ok(absolute) => Ok(absolute),
			Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.join(url),
			Err(e) => Err(e),
		};

		resolved.map_err(|source| ConfigError::InvalidUrl { url: url.to_owned(), source }.into())
	}

	/// Whether `url` addresses the login, refresh, or logout endpoint.
	///
	/// Matches on origin and path; query strings and fragments are ignored. Unresolvable
	/// URLs never match.
	pub fn is_session_endpoint(&self, url: &str) -> bool {
		let Ok(target) = self.resolve(url) else {
			return false;
		};

		[&self.endpoints.login, &self.endpoints.refresh, &self.endpoints.logout]
			.into_iter()
			.filter_map(|endpoint| self.resolve(endpoint).ok())
			.any(|endpoint| endpoint.origin() == target.origin() && endpoint.path() == target.path())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> GatewayConfig {
		GatewayConfig::builder(
			Url::parse("https://app.example.com/").expect("Base URL fixture should parse."),
		)
		.build()
		.expect("Default configuration should validate.")
	}

	#[test]
	fn resolve_joins_relative_paths_and_keeps_absolute_urls() {
		let config = config();

		assert_eq!(
			config.resolve("/api/events?week=3").expect("Relative path should resolve.").as_str(),
			"https://app.example.com/api/events?week=3"
		);
		assert_eq!(
			config
				.resolve("https://files.example.com/upload")
				.expect("Absolute URL should resolve.")
				.as_str(),
			"https://files.example.com/upload"
		);
		assert!(matches!(
			config.resolve("https://[broken"),
			Err(Error::Config(ConfigError::InvalidUrl { .. }))
		));
	}

	#[test]
	fn session_endpoints_are_recognized_by_origin_and_path() {
		let config = config();

		assert!(config.is_session_endpoint("/auth/login"));
		assert!(config.is_session_endpoint("auth/refresh"));
		assert!(config.is_session_endpoint("https://app.example.com/auth/logout?reason=idle"));
		assert!(!config.is_session_endpoint("/auth/login/help"));
		assert!(!config.is_session_endpoint("/security/csrf-token"));
		assert!(!config.is_session_endpoint("https://other.example.com/auth/login"));
		assert!(!config.is_session_endpoint("https://[broken"));
	}

	#[test]
	fn mismatch_rule_matches_message_case_insensitively() {
		let rule = CsrfMismatchRule::default();

		assert!(rule.matches(&ApiResponse::new(403, "{\"message\":\"Invalid CSRF token\"}")));
		assert!(rule.matches(&ApiResponse::new(403, "invalid csrf token")));
		assert!(!rule.matches(&ApiResponse::new(403, "{\"message\":\"Forbidden\"}")));
		assert!(!rule.matches(&ApiResponse::new(401, "{\"message\":\"Invalid CSRF token\"}")));
	}

	#[test]
	fn mismatch_rule_accepts_configured_error_code() {
		let rule =
			CsrfMismatchRule { error_code: Some("EBADCSRFTOKEN".into()), ..Default::default() };

		assert!(rule.matches(&ApiResponse::new(
			403,
			"{\"code\":\"EBADCSRFTOKEN\",\"message\":\"Jeton invalide\"}"
		)));
		assert!(!rule.matches(&ApiResponse::new(403, "{\"code\":\"EPERM\",\"message\":\"Nope\"}")));
	}

	#[test]
	fn from_json_applies_defaults_and_reports_paths() {
		let config = GatewayConfig::from_json(
			"{\"baseUrl\":\"http://localhost:8080/\",\"endpoints\":{\"refresh\":\"/session/refresh\"}}",
		)
		.expect("Partial configuration should parse.");

		assert_eq!(config.endpoints.refresh, "/session/refresh");
		assert_eq!(config.endpoints.logout, "/auth/logout");
		assert_eq!(config.csrf_header, GatewayConfig::DEFAULT_CSRF_HEADER);
		assert_eq!(config.csrf_mismatch.marker, "csrf");

		let err = GatewayConfig::from_json("{\"baseUrl\":\"http://localhost/\",\"csrfHeader\":7}")
			.expect_err("Numeric header name should fail to parse.");

		match err {
			Error::Config(ConfigError::ConfigParse { source }) =>
				assert_eq!(source.path().to_string(), "csrfHeader"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}
}
