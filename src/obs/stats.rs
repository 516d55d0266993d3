// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	obs::{self, AuthMode, CallOutcome},
};

/// Event recorded by the access layer for every upstream call stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricEvent {
	/// An outbound call started in the given mode.
	Request(AuthMode),
	/// A cache-eligible call was served from the response cache.
	CacheHit,
	/// A cache-eligible call missed the response cache.
	CacheMiss,
	/// A call that reached the network completed.
	Completed {
		/// Exclusive outcome classification.
		outcome: CallOutcome,
		/// Time spent on the network.
		latency: StdDuration,
	},
}

/// Point-in-time copy of the aggregated counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsView {
	/// Every outbound call, cache hits included.
	pub requests_total: u64,
	/// Calls in [`AuthMode::Meta`].
	pub requests_meta: u64,
	/// Calls in [`AuthMode::Res`].
	pub requests_res: u64,
	/// Calls in [`AuthMode::User`].
	pub requests_user: u64,
	/// Response cache hits.
	pub cache_hits: u64,
	/// Response cache misses.
	pub cache_misses: u64,
	/// Upstream HTTP 429 responses.
	pub http_429: u64,
	/// Other non-2xx upstream responses.
	pub http_errors: u64,
	/// Calls that received no response.
	pub transport_errors: u64,
	/// Accumulated network latency in milliseconds.
	pub latency_ms_sum: f64,
	/// Average network latency over calls that were not cache hits.
	pub latency_ms_avg: f64,
	/// Response bodies held by the metadata cache.
	///
	/// Only [`NullbrClient::metrics_snapshot`](crate::client::NullbrClient::metrics_snapshot)
	/// fills this in; the aggregator alone reports zero.
	pub meta_cache_size: usize,
}
impl MetricsView {
	/// Calls that went past the response cache.
	pub fn network_calls(&self) -> u64 {
		self.requests_total.saturating_sub(self.cache_hits)
	}
}

#[derive(Clone, Debug, Default)]
struct Counters {
	requests_total: u64,
	requests_meta: u64,
	requests_res: u64,
	requests_user: u64,
	cache_hits: u64,
	cache_misses: u64,
	http_429: u64,
	http_errors: u64,
	transport_errors: u64,
	latency_ms_sum: f64,
}
impl Counters {
	fn apply(&mut self, event: MetricEvent) {
		match event {
			MetricEvent::Request(mode) => {
				self.requests_total += 1;

				match mode {
					AuthMode::Meta => self.requests_meta += 1,
					AuthMode::Res => self.requests_res += 1,
					AuthMode::User => self.requests_user += 1,
				}
			},
			MetricEvent::CacheHit => self.cache_hits += 1,
			MetricEvent::CacheMiss => self.cache_misses += 1,
			MetricEvent::Completed { outcome, latency } => {
				match outcome {
					CallOutcome::Success => {},
					CallOutcome::RateLimited => self.http_429 += 1,
					CallOutcome::HttpError => self.http_errors += 1,
					CallOutcome::TransportError => self.transport_errors += 1,
				}

				self.latency_ms_sum += latency.as_secs_f64() * 1_000.;
			},
		}
	}

	fn view(&self) -> MetricsView {
		let network_calls = self.requests_total.saturating_sub(self.cache_hits);
		let latency_ms_avg = if network_calls > 0 {
			round2(self.latency_ms_sum / network_calls as f64)
		} else {
			0.
		};

		MetricsView {
			requests_total: self.requests_total,
			requests_meta: self.requests_meta,
			requests_res: self.requests_res,
			requests_user: self.requests_user,
			cache_hits: self.cache_hits,
			cache_misses: self.cache_misses,
			http_429: self.http_429,
			http_errors: self.http_errors,
			transport_errors: self.transport_errors,
			latency_ms_sum: self.latency_ms_sum,
			latency_ms_avg,
			meta_cache_size: 0,
		}
	}
}

/// Process-wide counters for upstream calls.
///
/// All counters live behind one lock so `snapshot(true)` reads and zeroes them as a unit;
/// concurrent `snapshot(false)` callers never disturb each other.
#[derive(Debug, Default)]
pub struct AccessMetrics(Mutex<Counters>);
impl AccessMetrics {
	/// Records one event (and mirrors it to the global recorder when enabled).
	pub fn record(&self, event: MetricEvent) {
		self.0.lock().apply(event);
		obs::emit_event(event);
	}

	/// Returns the current values; with `reset`, zeroes every counter in the same step.
	pub fn snapshot(&self, reset: bool) -> MetricsView {
		let mut guard = self.0.lock();
		let view = guard.view();

		if reset {
			*guard = Counters::default();
		}

		view
	}
}

fn round2(value: f64) -> f64 {
	(value * 100.).round() / 100.
}
