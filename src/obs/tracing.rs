// crates.io
use tracing::{Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::AuthMode};

/// Span wrapper attached to every upstream call.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: Span,
}
impl CallSpan {
	/// Creates a new span tagged with the auth mode and endpoint path.
	pub fn new(mode: AuthMode, endpoint: &str) -> Self {
		let span = tracing::info_span!(
			"nullbr.request",
			mode = mode.as_str(),
			endpoint,
			outcome = tracing::field::Empty,
		);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		// crates.io
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}

	/// Records the call outcome on the span.
	pub fn record_outcome(&self, outcome: &'static str) {
		self.span.record("outcome", outcome);
	}
}
