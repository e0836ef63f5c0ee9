//! Request lifecycle orchestration.
//!
//! [`Gateway::send`] drives one caller attempt through the session recovery paths:
//!
//! 1. Ensure a CSRF token is held (a local read on the fast path).
//! 2. Dispatch through the [`RequestExecutor`].
//! 3. On a CSRF mismatch, re-provision the token and resend once. A second mismatch is
//!    returned as-is.
//! 4. On `401`, join or start a refresh. A successful refresh resends the original attempt
//!    once and returns whatever that produces. A failed refresh signs out, waits for the
//!    session to be cleared, then returns the `401` the caller already received.
//!
//! Attempts tagged with [`RequestAttempt::for_auth_endpoint`] stop after step 2, so the
//! login, refresh, and logout endpoints never recurse into their own recovery paths.
//! Untagged attempts whose URL resolves to one of the configured login, refresh, or logout
//! endpoints are treated the same way. Transport failures are surfaced without recovery.
//!
//! A mutating attempt that still has no CSRF token after step 1 goes out without the
//! header and is logged as a CSRF failure.

// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	csrf::CsrfProvisioner,
	flows::{FlowMetrics, LogoutCoordinator, RefreshCoordinator, RefreshResult, SessionGrant},
	http::{HttpTransport, RequestExecutor},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{ApiResponse, RequestAttempt},
	session::{SessionStatus, SessionStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// HTTP status signalling an expired or invalid access token.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Gateway wired to the reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Authenticated request gateway.
///
/// Cloning is cheap and every clone shares the session store, the in-flight slots, and
/// the counters.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<GatewayConfig>,
	session: Arc<SessionStore>,
	executor: RequestExecutor<T>,
	csrf: CsrfProvisioner<T>,
	refresh: RefreshCoordinator<T>,
	logout: LogoutCoordinator<T>,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway with a fresh, empty session.
	pub fn new(config: GatewayConfig, transport: Arc<T>) -> Self {
		Self::with_session(config, transport, SessionStore::shared())
	}

	/// Creates a gateway over an existing session store.
	pub fn with_session(
		config: GatewayConfig,
		transport: Arc<T>,
		session: Arc<SessionStore>,
	) -> Self {
		let config = Arc::new(config);
		let executor = RequestExecutor::new(transport, session.clone(), config.clone());

		Self {
			config,
			session,
			csrf: CsrfProvisioner::new(executor.clone()),
			refresh: RefreshCoordinator::new(executor.clone()),
			logout: LogoutCoordinator::new(executor.clone()),
			executor,
		}
	}

	/// Returns the gateway configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Returns the shared session store.
	pub fn session(&self) -> &Arc<SessionStore> {
		&self.session
	}

	/// Returns the refresh coordinator's counters.
	pub fn refresh_metrics(&self) -> &Arc<FlowMetrics> {
		self.refresh.metrics()
	}

	/// Returns the logout coordinator's counters.
	pub fn logout_metrics(&self) -> &Arc<FlowMetrics> {
		self.logout.metrics()
	}

	/// Returns the CSRF provisioner's counters.
	pub fn csrf_metrics(&self) -> &Arc<FlowMetrics> {
		self.csrf.metrics()
	}

	/// Reports whether the session is authenticated, being checked, or signed out.
	pub fn status(&self) -> SessionStatus {
		match self.session.snapshot().status() {
			SessionStatus::Unauthenticated if self.refresh.in_flight() => SessionStatus::Checking,
			status => status,
		}
	}

	/// Sends `attempt`, recovering from CSRF mismatches and expired access tokens.
	///
	/// Non-2xx responses are returned as `Ok`; after recovery is exhausted the last
	/// response is returned verbatim.
	pub async fn send(&self, attempt: &RequestAttempt) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = FlowSpan::new(KIND, "send").instrument(self.drive(attempt)).await;

		obs::record_flow_outcome(
			KIND,
			match &result {
				Ok(response) if response.is_success() => FlowOutcome::Success,
				_ => FlowOutcome::Failure,
			},
		);

		result
	}

	/// Exchanges `credentials` for a session.
	///
	/// The credentials are posted as JSON to the login endpoint. A 2xx answer stores the
	/// issued token; any other status is returned untouched and never triggers a refresh.
	pub async fn login<C>(&self, credentials: &C) -> Result<ApiResponse>
	where
		C: ?Sized + Serialize,
	{
		const KIND: FlowKind = FlowKind::Login;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let attempt = RequestAttempt::post(&self.config.endpoints.login)
			.with_json(credentials)?
			.for_auth_endpoint();
		let result = FlowSpan::new(KIND, "login")
			.instrument(async {
				let response = self.drive(&attempt).await?;

				if response.is_success() {
					let (access_token, user_id) = response.json::<SessionGrant>()?.into_parts();

					self.session.set_credentials(access_token, user_id);
				}

				Ok::<_, Error>(response)
			})
			.await;

		obs::record_flow_outcome(
			KIND,
			match &result {
				Ok(response) if response.is_success() => FlowOutcome::Success,
				_ => FlowOutcome::Failure,
			},
		);

		result
	}

	/// Signs out through the shared logout flight; the session is cleared on return.
	pub async fn logout(&self) {
		self.logout.logout().await;
	}

	/// Calls the refresh endpoint to resume a session kept by the server-side cookie.
	///
	/// A failed refresh clears local state without calling the logout endpoint.
	pub async fn restore_session(&self) -> SessionStatus {
		match self.refresh.refresh().await {
			RefreshResult::Refreshed { .. } => SessionStatus::Authenticated,
			RefreshResult::Failed(reason) => {
				obs::trace_event(FlowKind::Refresh, "restore_failed", &reason);
				self.session.clear();

				SessionStatus::Unauthenticated
			},
		}
	}

	async fn drive(&self, attempt: &RequestAttempt) -> Result<ApiResponse> {
		self.csrf.ensure_token().await;

		if attempt.method.is_mutating() && self.session.csrf_token().is_none() {
			obs::trace_failure(FlowKind::Csrf, "mutating_without_token", &attempt.id());
		}

		let mut response = self.executor.execute(attempt).await?;

		if attempt.is_auth_endpoint() || self.config.is_session_endpoint(&attempt.url) {
			return Ok(response);
		}
		if self.csrf.is_mismatch(&response) {
			obs::trace_event(FlowKind::Csrf, "mismatch_retry", &attempt.id());
			self.csrf.reprovision().await;

			response = self.executor.execute(attempt).await?;
		}
		if response.status != STATUS_UNAUTHORIZED {
			return Ok(response);
		}

		match self.refresh.refresh().await {
			RefreshResult::Refreshed { .. } => {
				obs::trace_event(FlowKind::Request, "refreshed_retry", &attempt.id());

				self.executor.execute(attempt).await
			},
			RefreshResult::Failed(reason) => {
				obs::trace_failure(FlowKind::Request, "session_expired", &reason);
				self.logout.logout().await;

				Ok(response)
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway over a cookie-keeping reqwest client.
	pub fn connect(config: GatewayConfig) -> Result<Self> {
		Ok(Self::new(config, Arc::new(ReqwestTransport::with_cookie_store()?)))
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			session: self.session.clone(),
			executor: self.executor.clone(),
			csrf: self.csrf.clone(),
			refresh: self.refresh.clone(),
			logout: self.logout.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.config.base_url.as_str())
			.field("session", &self.session)
			.field("refresh", &self.refresh)
			.field("logout", &self.logout)
			.finish()
	}
}
