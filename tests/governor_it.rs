// std
use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration as StdDuration,
};
// self
use nullbr_access::{_preludet::*, governor::ConcurrencyGovernor};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_more_than_limit_in_flight() {
	let governor = Arc::new(ConcurrencyGovernor::new(3));
	let active = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));
	let tasks = (0..12)
		.map(|i| {
			let governor = governor.clone();
			let active = active.clone();
			let peak = peak.clone();

			tokio::spawn(async move {
				governor
					.run_guarded(|| async {
						let now = active.fetch_add(1, Ordering::SeqCst) + 1;

						peak.fetch_max(now, Ordering::SeqCst);
						tokio::time::sleep(StdDuration::from_millis(30)).await;
						active.fetch_sub(1, Ordering::SeqCst);

						i
					})
					.await
			})
		})
		.collect::<Vec<_>>();
	let mut outputs = Vec::new();

	for task in tasks {
		outputs.push(task.await.expect("Guarded task should join."));
	}

	outputs.sort_unstable();

	assert_eq!(outputs, (0..12).collect::<Vec<_>>());
	assert_eq!(peak.load(Ordering::SeqCst), 3);
	assert_eq!(governor.in_flight(), 0);
}

#[tokio::test]
async fn waiting_caller_proceeds_once_a_slot_frees() {
	let governor = Arc::new(ConcurrencyGovernor::new(1));
	let (release, released) = tokio::sync::oneshot::channel::<()>();
	let holder = {
		let governor = governor.clone();

		tokio::spawn(async move {
			governor
				.run_guarded(|| async {
					let _ = released.await;
				})
				.await
		})
	};

	while governor.in_flight() == 0 {
		tokio::task::yield_now().await;
	}

	let waiter = {
		let governor = governor.clone();

		tokio::spawn(async move { governor.run_guarded(|| async { "second" }).await })
	};

	tokio::time::sleep(StdDuration::from_millis(20)).await;

	assert!(!waiter.is_finished(), "Second caller must wait for the permit.");

	release.send(()).expect("Holder should still be waiting.");
	holder.await.expect("Holder should join.");

	assert_eq!(waiter.await.expect("Waiter should join."), "second");
}
