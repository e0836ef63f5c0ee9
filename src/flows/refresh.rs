//! Access-token refresh with a single-flight guard.
//!
//! [`RefreshCoordinator::refresh`] trades the out-of-band session cookie for a new access
//! token. Every caller that asks while an exchange is pending receives that exchange's
//! outcome; the in-flight slot is emptied the instant the exchange settles, so an expiry
//! observed afterwards starts a brand-new exchange. On success the new token is written
//! to the [`SessionStore`](crate::session::SessionStore) exactly once, before any caller
//! resumes. Failure is only reported: deciding to sign out belongs to the gateway.

// self
use crate::{
	_prelude::*,
	flows::{self, FlightRole, FlowMetrics, SessionGrant, SingleFlight},
	http::{HttpTransport, RequestExecutor},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::RequestAttempt,
	session::TokenSecret,
};

/// Outcome shared by every caller that took part in one refresh exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshResult {
	/// The server issued a new access token.
	Refreshed {
		/// Newly issued bearer credential.
		access_token: TokenSecret,
		/// User identifier reported alongside the token.
		user_id: Option<String>,
	},
	/// The session could not be refreshed.
	Failed(RefreshFailure),
}
impl RefreshResult {
	/// Whether the exchange produced a new token.
	pub fn is_refreshed(&self) -> bool {
		matches!(self, Self::Refreshed { .. })
	}
}

/// Reasons a refresh exchange fails.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// The refresh endpoint answered with a non-2xx status.
	#[error("Refresh endpoint rejected the session with status {status}.")]
	Rejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// The refresh endpoint answered 2xx with an unusable payload.
	#[error("Refresh response is malformed: {message}")]
	Malformed {
		/// Decoder diagnostics.
		message: String,
	},
	/// No response was obtained.
	#[error("Refresh exchange failed before a response arrived: {message}")]
	Transport {
		/// Transport diagnostics.
		message: String,
	},
}

/// Single-flight refresh protocol over a [`RequestExecutor`].
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	executor: RequestExecutor<T>,
	flight: Arc<SingleFlight<RefreshResult>>,
	metrics: Arc<FlowMetrics>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a coordinator with an empty in-flight slot.
	pub fn new(executor: RequestExecutor<T>) -> Self {
		Self { executor, flight: Default::default(), metrics: Default::default() }
	}

	/// Returns the coordinator's counters.
	pub fn metrics(&self) -> &Arc<FlowMetrics> {
		&self.metrics
	}

	/// Whether a refresh exchange is currently pending.
	pub fn in_flight(&self) -> bool {
		self.flight.in_flight()
	}

	/// Refreshes the access token, joining the pending exchange when there is one.
	pub async fn refresh(&self) -> RefreshResult {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		flows::record_entry(KIND, &self.metrics);

		let (result, role) = span
			.instrument(
				self.flight.run(|| self.exchange(), |result, waiters| self.settle(result, waiters)),
			)
			.await;

		flows::record_role(KIND, &self.metrics, role);

		match &result {
			RefreshResult::Refreshed { .. } => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			RefreshResult::Failed(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}
		if role == FlightRole::Follower {
			obs::trace_event(KIND, "joined", &"received shared refresh outcome");
		}

		result
	}

	async fn exchange(&self) -> RefreshResult {
		let attempt =
			RequestAttempt::post(&self.executor.config().endpoints.refresh).for_auth_endpoint();

		self.metrics.record_exchange();

		let response = match self.executor.execute(&attempt).await {
			Ok(response) => response,
			Err(e) =>
				return RefreshResult::Failed(RefreshFailure::Transport { message: e.to_string() }),
		};

		if !response.is_success() {
			return RefreshResult::Failed(RefreshFailure::Rejected { status: response.status });
		}

		match response.json::<SessionGrant>() {
			Ok(grant) => {
				let (access_token, user_id) = grant.into_parts();

				RefreshResult::Refreshed { access_token, user_id }
			},
			Err(e) => RefreshResult::Failed(RefreshFailure::Malformed { message: e.to_string() }),
		}
	}

	fn settle(&self, result: &RefreshResult, waiters: usize) {
		obs::record_flight_waiters(FlowKind::Refresh, waiters);

		match result {
			RefreshResult::Refreshed { access_token, user_id } => {
				self.executor.session().set_credentials(access_token.clone(), user_id.clone());
				self.metrics.record_success();
				obs::trace_event(
					FlowKind::Refresh,
					"refreshed",
					&format_args!("waiters={waiters}"),
				);
			},
			RefreshResult::Failed(reason) => {
				self.metrics.record_failure();
				obs::trace_failure(
					FlowKind::Refresh,
					"refresh_failed",
					&format_args!("{reason} waiters={waiters}"),
				);
			},
		}
	}
}
impl<T> Clone for RefreshCoordinator<T>
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
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("flight", &self.flight)
			.field("metrics", &self.metrics)
			.finish()
	}
}
