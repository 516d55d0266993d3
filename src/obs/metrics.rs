// self
use crate::obs::MetricEvent;

/// Mirrors an access-layer event into the global metrics recorder (when enabled).
pub fn emit_event(event: MetricEvent) {
	#[cfg(feature = "metrics")]
	{
		match event {
			MetricEvent::Request(mode) => {
				metrics::counter!("nullbr_upstream_requests_total", "mode" => mode.as_str())
					.increment(1);
			},
			MetricEvent::CacheHit => {
				metrics::counter!("nullbr_cache_lookups_total", "result" => "hit").increment(1);
			},
			MetricEvent::CacheMiss => {
				metrics::counter!("nullbr_cache_lookups_total", "result" => "miss").increment(1);
			},
			MetricEvent::Completed { outcome, latency } => {
				metrics::counter!("nullbr_upstream_outcomes_total", "outcome" => outcome.as_str())
					.increment(1);
				metrics::histogram!("nullbr_upstream_latency_seconds").record(latency.as_secs_f64());
			},
		}
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::obs::AuthMode;

	#[test]
	fn emit_event_noop_without_recorder() {
		emit_event(MetricEvent::Request(AuthMode::Meta));
		emit_event(MetricEvent::CacheHit);
	}
}
