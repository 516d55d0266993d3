//! Concurrency governor bounding simultaneous outbound upstream calls.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use async_lock::Semaphore;
// self
use crate::_prelude::*;

/// Counting gate admitting at most `limit` guarded executions at a time.
///
/// Callers beyond the limit suspend until a slot frees. Only the network call is wrapped,
/// so response cache hits never consume a slot.
#[derive(Debug)]
pub struct ConcurrencyGovernor {
	permits: Semaphore,
	limit: usize,
	in_flight: AtomicUsize,
}
impl ConcurrencyGovernor {
	/// Default number of concurrent upstream calls.
	pub const DEFAULT_LIMIT: usize = 20;

	/// Creates a governor; a zero limit is treated as one.
	pub fn new(limit: usize) -> Self {
		let limit = limit.max(1);

		Self { permits: Semaphore::new(limit), limit, in_flight: AtomicUsize::new(0) }
	}

	/// Configured ceiling.
	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Guarded executions currently running.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Runs `f` once a slot is available and returns its output.
	pub async fn run_guarded<F, Fut>(&self, f: F) -> Fut::Output
	where
		F: FnOnce() -> Fut,
		Fut: Future,
	{
		let _permit = self.permits.acquire().await;
		let _slot = InFlight::enter(&self.in_flight);

		f().await
	}
}
impl Default for ConcurrencyGovernor {
	fn default() -> Self {
		Self::new(Self::DEFAULT_LIMIT)
	}
}

/// Keeps the in-flight gauge accurate even when the guarded future is dropped early.
struct InFlight<'a>(&'a AtomicUsize);
impl<'a> InFlight<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::AcqRel);

		Self(counter)
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}
