//! Optional observability helpers for credential flows and transport calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oidc_conduit.flow` with the `flow` and
//!   `stage` (call site) fields.
//! - Enable `metrics` to increment the `oidc_conduit_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Token refresh against the provider token endpoint.
	Refresh,
	/// Interactive authorization through the platform launcher.
	Authorize,
	/// Remote + local logout.
	Logout,
	/// Single authenticated request.
	Request,
	/// Bounded-retry request loop.
	RetryRequest,
	/// Streaming chat call.
	Stream,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Refresh => "refresh",
			FlowKind::Authorize => "authorize",
			FlowKind::Logout => "logout",
			FlowKind::Request => "request",
			FlowKind::RetryRequest => "retry_request",
			FlowKind::Stream => "stream",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
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
