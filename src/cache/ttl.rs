//! Capacity-bounded, TTL-aware map with an ordered age index.
//!
//! Every entry carries the instant it was last stored (or touched). A [`BTreeMap`] keyed by
//! `(stored_at, sequence)` mirrors the entry map so the oldest entry is always the first index
//! key: eviction and expiry sweeps are `O(log n)` per removed entry instead of a full scan.
//! Expired entries are logically absent on every read path even before they are reaped.

// std
use std::borrow::Borrow;
// self
use crate::_prelude::*;

/// A cached value together with the instant it was stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
	/// Cached value.
	pub value: V,
	/// Instant the value was stored or last touched.
	pub stored_at: OffsetDateTime,
}
impl<V> CacheEntry<V> {
	/// Returns true while `now - stored_at <= ttl`.
	pub fn is_fresh_at(&self, ttl: Duration, now: OffsetDateTime) -> bool {
		now - self.stored_at <= ttl
	}
}

type AgeKey = (OffsetDateTime, u64);

#[derive(Debug)]
struct Slot<V> {
	entry: CacheEntry<V>,
	age: AgeKey,
}

/// Map that enforces both a time-to-live and a hard capacity ceiling.
#[derive(Debug)]
pub struct TtlMap<K, V> {
	ttl: Duration,
	capacity: usize,
	entries: HashMap<K, Slot<V>>,
	ages: BTreeMap<AgeKey, K>,
	sequence: u64,
}
impl<K, V> TtlMap<K, V>
where
	K: Clone + Eq + Hash,
{
	/// Creates an empty map; a zero capacity is treated as one.
	pub fn new(ttl: Duration, capacity: usize) -> Self {
		Self {
			ttl,
			capacity: capacity.max(1),
			entries: HashMap::new(),
			ages: BTreeMap::new(),
			sequence: 0,
		}
	}

	/// Configured time-to-live.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Configured capacity ceiling.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Number of physically present entries, including expired ones not yet reaped.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true when no entries are present.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns the fresh entry for `key` without changing its age.
	pub fn get_at<Q>(&self, key: &Q, now: OffsetDateTime) -> Option<&CacheEntry<V>>
	where
		K: Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		self.entries.get(key).map(|slot| &slot.entry).filter(|entry| entry.is_fresh_at(self.ttl, now))
	}

	/// Returns the fresh entry for `key` and restamps it with `now`.
	///
	/// An expired entry is removed and reported as absent.
	pub fn touch_at<Q>(&mut self, key: &Q, now: OffsetDateTime) -> Option<&mut CacheEntry<V>>
	where
		K: Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		let fresh = self.entries.get(key)?.entry.is_fresh_at(self.ttl, now);

		if !fresh {
			self.remove(key);

			return None;
		}

		let age = self.next_age(now);
		let slot = self.entries.get_mut(key)?;
		let owned = self.ages.remove(&slot.age)?;

		slot.age = age;
		slot.entry.stored_at = now;
		self.ages.insert(age, owned);

		Some(&mut slot.entry)
	}

	/// Stores `value` under `key`, replacing any previous entry wholesale.
	///
	/// When `key` is new and the map is full, the oldest entries are evicted until there is
	/// room; the evicted keys are returned.
	pub fn insert_at(&mut self, key: K, value: V, now: OffsetDateTime) -> Vec<K> {
		let mut evicted = Vec::new();

		if let Some(previous) = self.entries.remove(&key) {
			self.ages.remove(&previous.age);
		} else {
			while self.entries.len() >= self.capacity {
				match self.evict_oldest() {
					Some(key) => evicted.push(key),
					None => break,
				}
			}
		}

		let age = self.next_age(now);

		self.ages.insert(age, key.clone());
		self.entries.insert(key, Slot { entry: CacheEntry { value, stored_at: now }, age });

		evicted
	}

	/// Removes every entry older than the TTL, returning how many were reaped.
	pub fn purge_expired_at(&mut self, now: OffsetDateTime) -> usize {
		let mut reaped = 0;

		while let Some((&(stored_at, _), _)) = self.ages.first_key_value() {
			if now - stored_at <= self.ttl {
				break;
			}
			if self.evict_oldest().is_some() {
				reaped += 1;
			}
		}

		reaped
	}

	/// Removes `key`, returning its value when present (fresh or not).
	pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		let slot = self.entries.remove(key)?;

		self.ages.remove(&slot.age);

		Some(slot.entry.value)
	}

	/// Drops every entry.
	pub fn clear(&mut self) {
		self.entries.clear();
		self.ages.clear();
	}

	fn evict_oldest(&mut self) -> Option<K> {
		let (_, key) = self.ages.pop_first()?;

		self.entries.remove(&key);

		Some(key)
	}

	fn next_age(&mut self, now: OffsetDateTime) -> AgeKey {
		self.sequence = self.sequence.wrapping_add(1);

		(now, self.sequence)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const T0: OffsetDateTime = datetime!(2025-11-10 12:00 UTC);

	#[test]
	fn entries_expire_after_ttl() {
		let mut map = TtlMap::new(Duration::seconds(30), 8);

		map.insert_at("a", 1, T0);

		assert_eq!(map.get_at("a", T0 + Duration::seconds(30)).map(|e| e.value), Some(1));
		assert!(map.get_at("a", T0 + Duration::seconds(31)).is_none());
		assert_eq!(map.len(), 1, "Expired entries stay until reaped.");
		assert_eq!(map.purge_expired_at(T0 + Duration::seconds(31)), 1);
		assert!(map.is_empty());
	}

	#[test]
	fn insert_past_capacity_evicts_single_oldest() {
		let mut map = TtlMap::new(Duration::minutes(5), 3);

		map.insert_at("a", 1, T0);
		map.insert_at("b", 2, T0 + Duration::seconds(1));
		map.insert_at("c", 3, T0 + Duration::seconds(2));

		let evicted = map.insert_at("d", 4, T0 + Duration::seconds(3));

		assert_eq!(evicted, vec!["a"]);
		assert_eq!(map.len(), 3);
		assert!(map.get_at("a", T0 + Duration::seconds(3)).is_none());
		assert!(map.get_at("d", T0 + Duration::seconds(3)).is_some());
	}

	#[test]
	fn replacing_existing_key_never_evicts() {
		let mut map = TtlMap::new(Duration::minutes(5), 2);

		map.insert_at("a", 1, T0);
		map.insert_at("b", 2, T0);

		assert!(map.insert_at("a", 10, T0 + Duration::seconds(1)).is_empty());
		assert_eq!(map.len(), 2);
		assert_eq!(map.get_at("a", T0 + Duration::seconds(1)).map(|e| e.value), Some(10));

		// "b" is now the oldest.
		assert_eq!(map.insert_at("c", 3, T0 + Duration::seconds(2)), vec!["b"]);
	}

	#[test]
	fn touch_slides_expiry_and_reorders_eviction() {
		let mut map = TtlMap::new(Duration::seconds(10), 2);

		map.insert_at("a", 1, T0);
		map.insert_at("b", 2, T0 + Duration::seconds(1));

		assert!(map.touch_at("a", T0 + Duration::seconds(8)).is_some());
		assert!(map.get_at("a", T0 + Duration::seconds(15)).is_some(), "Touch restamps the entry.");
		assert_eq!(map.insert_at("c", 3, T0 + Duration::seconds(9)), vec!["b"]);
	}

	#[test]
	fn touch_removes_expired_entry() {
		let mut map = TtlMap::new(Duration::seconds(10), 2);

		map.insert_at("a", 1, T0);

		assert!(map.touch_at("a", T0 + Duration::seconds(11)).is_none());
		assert!(map.is_empty());
	}

	#[test]
	fn purge_stops_at_first_fresh_entry() {
		let mut map = TtlMap::new(Duration::seconds(10), 8);

		map.insert_at("old-1", 1, T0);
		map.insert_at("old-2", 2, T0 + Duration::seconds(1));
		map.insert_at("fresh", 3, T0 + Duration::seconds(20));

		assert_eq!(map.purge_expired_at(T0 + Duration::seconds(25)), 2);
		assert_eq!(map.len(), 1);
		assert_eq!(map.remove("fresh"), Some(3));
	}
}
