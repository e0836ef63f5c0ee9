//! Optional observability helpers for gateway flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_gateway.flow` with the `flow` and
//!   `stage` fields, plus debug/warn events for settlements and swallowed failures.
//! - Enable `metrics` to increment the `session_gateway_flow_total` counter for every
//!   attempt/joined/success/failure, labeled by `flow` + `outcome`, and to record the
//!   `session_gateway_flight_waiters` histogram each time a single-flight exchange settles.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Full request lifecycle for a caller-issued attempt.
	Request,
	/// Credential exchange.
	Login,
	/// Access-token refresh exchange.
	Refresh,
	/// Sign-out exchange.
	Logout,
	/// CSRF token provisioning.
	Csrf,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Request => "request",
			FlowKind::Login => "login",
			FlowKind::Refresh => "refresh",
			FlowKind::Logout => "logout",
			FlowKind::Csrf => "csrf",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a gateway helper.
	Attempt,
	/// Caller piggy-backed on an exchange that was already in flight.
	Joined,
	/// Successful completion.
	Success,
	/// Failure reported back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Joined => "joined",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
