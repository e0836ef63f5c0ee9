//! CSRF token provisioning.
//!
//! [`CsrfProvisioner::ensure_token`] is a local read when a token is already held and a
//! provisioning call otherwise. Provisioning failures are logged and swallowed: the
//! request then goes out without the header and the server's mismatch answer drives the
//! gateway's one-shot retry. Concurrent provisioning (fast-path misses or forced
//! re-provisioning after mismatches) shares a single call.

// self
use crate::{
	_prelude::*,
	flows::{self, FlowMetrics, SingleFlight},
	http::{HttpTransport, RequestExecutor},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{ApiResponse, RequestAttempt},
	session::TokenSecret,
};

type ProvisionOutcome = Result<TokenSecret, String>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfGrant {
	csrf_token: String,
}

/// Keeps a CSRF token in the session store.
pub struct CsrfProvisioner<T>
where
	T: ?Sized + HttpTransport,
{
	executor: RequestExecutor<T>,
	flight: Arc<SingleFlight<ProvisionOutcome>>,
	metrics: Arc<FlowMetrics>,
}
impl<T> CsrfProvisioner<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a provisioner with an empty in-flight slot.
	pub fn new(executor: RequestExecutor<T>) -> Self {
		Self { executor, flight: Default::default(), metrics: Default::default() }
	}

	/// Returns the provisioner's counters.
	pub fn metrics(&self) -> &Arc<FlowMetrics> {
		&self.metrics
	}

	/// Makes sure a CSRF token is held; no network call when one already is.
	pub async fn ensure_token(&self) {
		if self.executor.session().csrf_token().is_some() {
			return;
		}

		self.provision("ensure_token").await;
	}

	/// Drops the current token and provisions a new one unconditionally.
	pub async fn reprovision(&self) {
		self.executor.session().set_csrf_token(None);
		self.provision("reprovision").await;
	}

	/// Whether `response` is the server's CSRF-mismatch rejection.
	pub fn is_mismatch(&self, response: &ApiResponse) -> bool {
		self.executor.config().csrf_mismatch.matches(response)
	}

	async fn provision(&self, stage: &'static str) {
		const KIND: FlowKind = FlowKind::Csrf;

		let span = FlowSpan::new(KIND, stage);

		flows::record_entry(KIND, &self.metrics);

		let (outcome, role) = span
			.instrument(
				self.flight.run(|| self.exchange(), |outcome, waiters| self.settle(outcome, waiters)),
			)
			.await;

		flows::record_role(KIND, &self.metrics, role);
		obs::record_flow_outcome(
			KIND,
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);
	}

	async fn exchange(&self) -> ProvisionOutcome {
		let attempt =
			RequestAttempt::get(&self.executor.config().endpoints.csrf_token).for_auth_endpoint();

		self.metrics.record_exchange();

		let response = self.executor.execute(&attempt).await.map_err(|e| e.to_string())?;

		if !response.is_success() {
			return Err(format!("status {}", response.status));
		}

		response
			.json::<CsrfGrant>()
			.map(|grant| TokenSecret::new(grant.csrf_token))
			.map_err(|e| e.to_string())
	}

	fn settle(&self, outcome: &ProvisionOutcome, waiters: usize) {
		obs::record_flight_waiters(FlowKind::Csrf, waiters);

		match outcome {
			Ok(token) => {
				self.executor.session().set_csrf_token(Some(token.clone()));
				self.metrics.record_success();
				obs::trace_event(
					FlowKind::Csrf,
					"provisioned",
					&format_args!("waiters={waiters}"),
				);
			},
			Err(reason) => {
				self.metrics.record_failure();
				obs::trace_failure(
					FlowKind::Csrf,
					"provision_failed",
					&format_args!("{reason} waiters={waiters}"),
				);
			},
		}
	}
}
impl<T> Clone for CsrfProvisioner<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			executor: self.executor.clone(),
			flight: self.flight.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<T> Debug for CsrfProvisioner<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CsrfProvisioner")
			.field("flight", &self.flight)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		config::GatewayConfig,
		error::TransportError,
		http::{OutboundRequest, TransportFuture},
		session::SessionStore,
	};

	struct CsrfEndpoint {
		calls: Mutex<Vec<String>>,
		status: u16,
	}
	impl HttpTransport for CsrfEndpoint {
		fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
			let count = {
				let mut calls = self.calls.lock();

				calls.push(request.url.path().to_owned());
				calls.len()
			};
			let response = ApiResponse::json_value(
				self.status,
				&serde_json::json!({ "csrfToken": format!("t{count}") }),
			);

			Box::pin(async move { Ok::<_, TransportError>(response) })
		}
	}

	fn provisioner(status: u16) -> (CsrfProvisioner<CsrfEndpoint>, Arc<CsrfEndpoint>) {
		let config = GatewayConfig::builder(
			Url::parse("https://app.example.com/").expect("Base URL fixture should parse."),
		)
		.build()
		.expect("Default configuration should validate.");
		let transport = Arc::new(CsrfEndpoint { calls: Mutex::new(Vec::new()), status });
		let executor =
			RequestExecutor::new(transport.clone(), SessionStore::shared(), Arc::new(config));

		(CsrfProvisioner::new(executor), transport)
	}

	#[tokio::test]
	async fn ensure_token_skips_network_when_token_is_held() {
		let (csrf, transport) = provisioner(200);

		csrf.executor.session().set_csrf_token(Some("t0".into()));
		csrf.ensure_token().await;
		csrf.ensure_token().await;

		assert!(transport.calls.lock().is_empty());
		assert_eq!(csrf.metrics().exchanges(), 0);
	}

	#[tokio::test]
	async fn ensure_token_provisions_once_then_uses_fast_path() {
		let (csrf, transport) = provisioner(200);

		csrf.ensure_token().await;
		csrf.ensure_token().await;

		assert_eq!(*transport.calls.lock(), vec!["/security/csrf-token".to_owned()]);
		assert_eq!(
			csrf.executor.session().csrf_token().as_ref().map(TokenSecret::expose),
			Some("t1")
		);
	}

	#[tokio::test]
	async fn reprovision_always_fetches_a_new_token() {
		let (csrf, transport) = provisioner(200);

		csrf.executor.session().set_csrf_token(Some("t0".into()));
		csrf.reprovision().await;

		assert_eq!(transport.calls.lock().len(), 1);
		assert_eq!(
			csrf.executor.session().csrf_token().as_ref().map(TokenSecret::expose),
			Some("t1")
		);
	}

	#[tokio::test]
	async fn provisioning_failure_is_swallowed() {
		let (csrf, transport) = provisioner(503);

		csrf.ensure_token().await;

		assert_eq!(transport.calls.lock().len(), 1);
		assert!(csrf.executor.session().csrf_token().is_none());
		assert_eq!(csrf.metrics().failures(), 1);
	}
}
