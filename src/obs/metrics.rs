// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"session_gateway_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how many callers joined a settled single-flight exchange.
///
/// A steady zero means the flight never deduplicated anything; large values point at a
/// burst of expiries hitting the same session.
pub fn record_flight_waiters(kind: FlowKind, waiters: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("session_gateway_flight_waiters", "flow" => kind.as_str())
			.record(waiters as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, waiters);
	}
}
