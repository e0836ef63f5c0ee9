//! Sign-out with a single-flight guard.
//!
//! Concurrent refresh failures all funnel into [`LogoutCoordinator::logout`], which
//! dispatches at most one sign-out exchange at a time. Local state is cleared when the
//! exchange settles whether or not the server acknowledged it, and before any caller
//! resumes.

// self
use crate::{
	_prelude::*,
	flows::{self, FlowMetrics, SingleFlight},
	http::{HttpTransport, RequestExecutor},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::RequestAttempt,
};

/// Single-flight sign-out protocol over a [`RequestExecutor`].
pub struct LogoutCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	executor: RequestExecutor<T>,
	flight: Arc<SingleFlight<bool>>,
	metrics: Arc<FlowMetrics>,
}
impl<T> LogoutCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a coordinator with an empty in-flight slot.
	pub fn new(executor: RequestExecutor<T>) -> Self {
		Self { executor, flight: Default::default(), metrics: Default::default() }
	}

	/// Returns the coordinator's counters; failures count unacknowledged sign-outs.
	pub fn metrics(&self) -> &Arc<FlowMetrics> {
		&self.metrics
	}

	/// Whether a sign-out exchange is currently pending.
	pub fn in_flight(&self) -> bool {
		self.flight.in_flight()
	}

	/// Signs out, joining the pending exchange when there is one.
	///
	/// The session is always cleared by the time this returns.
	pub async fn logout(&self) {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		flows::record_entry(KIND, &self.metrics);

		let (acknowledged, role) = span
			.instrument(self.flight.run(
				|| self.exchange(),
				|acknowledged, waiters| self.settle(*acknowledged, waiters),
			))
			.await;

		flows::record_role(KIND, &self.metrics, role);
		obs::record_flow_outcome(
			KIND,
			if acknowledged { FlowOutcome::Success } else { FlowOutcome::Failure },
		);
	}

	async fn exchange(&self) -> bool {
		let attempt =
			RequestAttempt::post(&self.executor.config().endpoints.logout).for_auth_endpoint();

		self.metrics.record_exchange();

		match self.executor.execute(&attempt).await {
			Ok(response) if response.is_success() => true,
			Ok(response) => {
				obs::trace_failure(
					FlowKind::Logout,
					"logout_rejected",
					&format_args!("status={}", response.status),
				);

				false
			},
			Err(e) => {
				obs::trace_failure(FlowKind::Logout, "logout_unreachable", &e);

				false
			},
		}
	}

	fn settle(&self, acknowledged: bool, waiters: usize) {
		obs::record_flight_waiters(FlowKind::Logout, waiters);

		self.executor.session().clear();

		if acknowledged {
			self.metrics.record_success();
		} else {
			self.metrics.record_failure();
		}

		obs::trace_event(
			FlowKind::Logout,
			"session_cleared",
			&format_args!("acknowledged={acknowledged} waiters={waiters}"),
		);
	}
}
impl<T> Clone for LogoutCoordinator<T>
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
impl<T> Debug for LogoutCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LogoutCoordinator")
			.field("flight", &self.flight)
			.field("metrics", &self.metrics)
			.finish()
	}
}
