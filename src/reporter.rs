//! Background task that periodically flushes and logs the metrics aggregator.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	sync::oneshot,
	task::JoinHandle,
	time::{self as tokio_time, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	obs::{AccessMetrics, MetricsView},
};

/// Handle to the running reporter task.
///
/// Each interval takes a resetting snapshot, so every logged line covers exactly one period.
/// [`shutdown`](Self::shutdown) flushes whatever accumulated since the last tick.
#[derive(Debug)]
pub struct MetricsReporter {
	stop: oneshot::Sender<()>,
	task: JoinHandle<MetricsView>,
}
impl MetricsReporter {
	/// Spawns the reporter on the current tokio runtime.
	pub fn spawn(metrics: Arc<AccessMetrics>, period: StdDuration) -> Self {
		let period = period.max(StdDuration::from_millis(1));
		let (stop, mut stopped) = oneshot::channel();
		let task = tokio::spawn(async move {
			let mut ticker = tokio_time::interval_at(Instant::now() + period, period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => log_interval(&metrics.snapshot(true)),
					_ = &mut stopped => break,
				}
			}

			let last = metrics.snapshot(true);

			log_interval(&last);

			last
		});

		Self { stop, task }
	}

	/// Stops the task and returns the final flushed interval.
	pub async fn shutdown(self) -> Result<MetricsView> {
		// The task may already be gone if the runtime is shutting down.
		let _ = self.stop.send(());

		self.task.await.map_err(Error::Reporter)
	}
}

fn log_interval(view: &MetricsView) {
	tracing::info!(
		requests_total = view.requests_total,
		requests_meta = view.requests_meta,
		requests_res = view.requests_res,
		requests_user = view.requests_user,
		cache_hits = view.cache_hits,
		cache_misses = view.cache_misses,
		http_429 = view.http_429,
		http_errors = view.http_errors,
		transport_errors = view.transport_errors,
		latency_ms_avg = view.latency_ms_avg,
		"upstream metrics interval",
	);
}
