//! Single-flight session coordinators: access-token refresh and sign-out.

pub mod logout;
pub mod refresh;

mod metrics;
mod singleflight;

pub use logout::*;
pub use metrics::FlowMetrics;
pub use refresh::*;
pub use singleflight::FlightRole;

pub(crate) use singleflight::SingleFlight;

// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
	session::TokenSecret,
};

/// Credentials payload returned by the login and refresh endpoints.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionGrant {
	pub(crate) access_token: String,
	#[serde(default)]
	pub(crate) user_id: Option<UserIdValue>,
}
impl SessionGrant {
	pub(crate) fn into_parts(self) -> (TokenSecret, Option<String>) {
		(TokenSecret::new(self.access_token), self.user_id.map(UserIdValue::into_string))
	}
}

// Backends disagree on whether user ids are strings or numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserIdValue {
	Text(String),
	Number(serde_json::Number),
}
impl UserIdValue {
	fn into_string(self) -> String {
		match self {
			Self::Text(value) => value,
			Self::Number(value) => value.to_string(),
		}
	}
}

pub(crate) fn record_entry(kind: FlowKind, metrics: &FlowMetrics) {
	metrics.record_call();
	obs::record_flow_outcome(kind, FlowOutcome::Attempt);
}

pub(crate) fn record_role(kind: FlowKind, metrics: &FlowMetrics, role: FlightRole) {
	if role == FlightRole::Follower {
		metrics.record_joined();
		obs::record_flow_outcome(kind, FlowOutcome::Joined);
	}
}
