//! Single-flight slot shared by the refresh, logout, and CSRF coordinators.
//!
//! A slot holds at most one in-flight exchange. The first caller creates the flight and
//! runs the exchange; callers arriving while it is pending join it and receive a clone of
//! the same outcome. On settlement the slot is emptied *before* the settle hook runs and
//! before any waiter observes the outcome, so a caller arriving after settlement always
//! starts a fresh exchange instead of reusing a stale one.
//!
//! The check-and-create step runs under a mutex, which keeps the slot correct on
//! multi-threaded runtimes. If the caller running the exchange is dropped mid-flight, the
//! next caller waiting on the same flight runs the exchange in its place.

// std
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
// crates.io
use async_lock::OnceCell;
// self
use crate::_prelude::*;

/// How a caller took part in a flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightRole {
	/// The caller ran the exchange.
	Leader,
	/// The caller received the outcome of an exchange run by someone else.
	Follower,
}

struct Flight<T> {
	outcome: OnceCell<T>,
	waiters: AtomicUsize,
}

pub(crate) struct SingleFlight<T> {
	slot: Mutex<Option<Arc<Flight<T>>>>,
}
impl<T> SingleFlight<T>
where
	T: Clone,
{
	/// Whether an exchange is currently pending.
	pub(crate) fn in_flight(&self) -> bool {
		self.slot.lock().is_some()
	}

	/// Runs `exchange` unless one is already pending, in which case its outcome is shared.
	///
	/// `settle` runs exactly once per exchange, after the slot is emptied and before any
	/// caller (leader included) resumes with the outcome. It receives the number of callers
	/// that joined the exchange.
	pub(crate) async fn run<F, Fut, S>(&self, exchange: F, settle: S) -> (T, FlightRole)
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
		S: FnOnce(&T, usize),
	{
		let flight = self.join_or_create();
		let led = AtomicBool::new(false);
		let (flight_ref, led_ref) = (&flight, &led);
		let outcome = flight
			.outcome
			.get_or_init(|| async move {
				led_ref.store(true, Ordering::Relaxed);

				let outcome = exchange().await;
				let waiters = self.release(flight_ref);

				settle(&outcome, waiters);

				outcome
			})
			.await
			.clone();
		let role =
			if led.load(Ordering::Relaxed) { FlightRole::Leader } else { FlightRole::Follower };

		(outcome, role)
	}

	fn join_or_create(&self) -> Arc<Flight<T>> {
		let mut slot = self.slot.lock();

		match slot.as_ref() {
			Some(flight) => {
				flight.waiters.fetch_add(1, Ordering::Relaxed);

				flight.clone()
			},
			None => {
				let flight =
					Arc::new(Flight { outcome: OnceCell::new(), waiters: AtomicUsize::new(0) });

				*slot = Some(flight.clone());

				flight
			},
		}
	}

	fn release(&self, flight: &Arc<Flight<T>>) -> usize {
		let mut slot = self.slot.lock();

		if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, flight)) {
			*slot = None;
		}

		flight.waiters.load(Ordering::Relaxed)
	}
}
impl<T> Default for SingleFlight<T> {
	fn default() -> Self {
		Self { slot: Mutex::new(None) }
	}
}
impl<T> Debug for SingleFlight<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SingleFlight").field("in_flight", &self.slot.lock().is_some()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;

	async fn counted(counter: &AtomicUsize, delay_ms: u64) -> usize {
		let value = counter.fetch_add(1, Ordering::SeqCst) + 1;

		tokio::time::sleep(StdDuration::from_millis(delay_ms)).await;

		value
	}

	async fn share(
		flight: &SingleFlight<usize>,
		counter: &AtomicUsize,
		settled: &AtomicUsize,
	) -> (usize, FlightRole) {
		flight
			.run(
				|| counted(counter, 20),
				|_, _| {
					settled.fetch_add(1, Ordering::SeqCst);
				},
			)
			.await
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_exchange() {
		let flight = SingleFlight::<usize>::default();
		let counter = AtomicUsize::new(0);
		let settled = AtomicUsize::new(0);
		let (a, b, c) = tokio::join!(
			share(&flight, &counter, &settled),
			share(&flight, &counter, &settled),
			share(&flight, &counter, &settled),
		);

		assert_eq!((a.0, b.0, c.0), (1, 1, 1));
		assert_eq!(counter.load(Ordering::SeqCst), 1);
		assert_eq!(settled.load(Ordering::SeqCst), 1);
		assert_eq!(
			[a.1, b.1, c.1].iter().filter(|role| **role == FlightRole::Leader).count(),
			1,
			"Exactly one caller must run the exchange."
		);
		assert!(!flight.in_flight());
	}

	#[tokio::test]
	async fn caller_after_settlement_starts_a_new_exchange() {
		let flight = SingleFlight::<usize>::default();
		let counter = AtomicUsize::new(0);
		let first = flight.run(|| counted(&counter, 1), |_, _| {}).await;
		let second = flight.run(|| counted(&counter, 1), |_, _| {}).await;

		assert_eq!(first, (1, FlightRole::Leader));
		assert_eq!(second, (2, FlightRole::Leader));
	}

	#[tokio::test]
	async fn slot_is_empty_before_settle_hook_and_waiters_resume() {
		let flight = SingleFlight::<usize>::default();
		let counter = AtomicUsize::new(0);
		let observed_in_flight = AtomicBool::new(true);
		let observed_waiters = AtomicUsize::new(0);
		let leader = flight.run(
			|| counted(&counter, 20),
			|_, waiters| {
				observed_in_flight.store(flight.in_flight(), Ordering::SeqCst);
				observed_waiters.store(waiters, Ordering::SeqCst);
			},
		);
		let follower = async {
			tokio::time::sleep(StdDuration::from_millis(5)).await;

			let joined = flight.run(|| counted(&counter, 20), |_, _| {}).await;

			(joined, flight.in_flight())
		};
		let (_, (joined, in_flight_after_join)) = tokio::join!(leader, follower);

		assert!(!observed_in_flight.load(Ordering::SeqCst));
		assert_eq!(observed_waiters.load(Ordering::SeqCst), 1);
		assert_eq!(joined, (1, FlightRole::Follower));
		assert!(!in_flight_after_join);
	}

	#[tokio::test]
	async fn dropped_leader_hands_exchange_to_waiter() {
		let flight = SingleFlight::<usize>::default();
		let counter = AtomicUsize::new(0);
		let leader = tokio::time::timeout(
			StdDuration::from_millis(10),
			flight.run(|| counted(&counter, 200), |_, _| {}),
		);
		let follower = async {
			tokio::time::sleep(StdDuration::from_millis(2)).await;

			flight.run(|| counted(&counter, 1), |_, _| {}).await
		};
		let (leader, follower) = tokio::join!(leader, follower);

		assert!(leader.is_err(), "Leader should time out while its exchange is pending.");
		assert_eq!(follower, (2, FlightRole::Leader));
		assert!(!flight.in_flight());
	}
}
