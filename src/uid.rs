//! 63-bit monotonically increasing unique-ID generator.
//!
//! Layout, MSB to LSB after the implicit zero sign bit: `epoch_ms[46] ||
//! offset[10] || shard_id[7]`. The offset counter wraps from 0x3FF back to
//! 0 and tolerates the wrap — the epoch-ms component keeps the id strictly
//! increasing across the millisecond boundary that follows a wrap.

use std::sync::atomic::{AtomicU64, Ordering};

const OFFSET_BITS: u32 = 10;
const SHARD_BITS: u32 = 7;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;
const SHARD_MASK: u64 = (1 << SHARD_BITS) - 1;

#[derive(Debug, Clone)]
pub struct UniqueIdConfig {
 /// Configured at startup, must be in `[0, 127]`.
 pub shard_id: u8,
 /// Custom epoch, milliseconds since the Unix epoch. Must be non-negative.
 pub epoch_base_ms: i64,
 /// When true, a same-millisecond offset wrap is logged via
 /// `tracing::warn!` rather than passed through silently.
 pub detect_wrap: bool,
}

impl Default for UniqueIdConfig {
 fn default() -> Self {
 Self {
 shard_id: 0,
 epoch_base_ms: 1_700_000_000_000,
 detect_wrap: false,
 }
 }
}

/// Generates strictly increasing 63-bit ids for one shard.
///
/// `state` packs `(epoch_ms_since_base << OFFSET_BITS) | offset` into a
/// single atomic word so each call advances it with one compare-and-swap.
pub struct UniqueIdGenerator {
 config: UniqueIdConfig,
 state: AtomicU64,
}

impl UniqueIdGenerator {
 pub fn new(config: UniqueIdConfig) -> Self {
 assert!(config.shard_id <= SHARD_MASK as u8, "shard_id out of range [0,127]");
 assert!(config.epoch_base_ms >= 0, "epoch_base_ms must be non-negative");
 Self {
 config,
 state: AtomicU64::new(0),
 }
 }

 fn now_since_base_ms(&self) -> u64 {
 let now_ms = chrono::Utc::now().timestamp_millis();
 (now_ms - self.config.epoch_base_ms).max(0) as u64
 }

 /// Produce the next id for this shard. Never returns a non-positive
 /// value and never repeats within this generator's lifetime (barring
 /// the theoretical exhaustion of the 46-bit millisecond field).
 pub fn next_id(&self) -> i64 {
 loop {
 let prev = self.state.load(Ordering::Acquire);
 let prev_ms = prev >> OFFSET_BITS;
 let prev_offset = prev & OFFSET_MASK;
 let now_ms = self.now_since_base_ms();

 let (ms, offset) = if now_ms > prev_ms {
 (now_ms, 0)
 } else {
 let next_offset = (prev_offset + 1) & OFFSET_MASK;
 if next_offset == 0 {
 if self.config.detect_wrap {
 tracing::warn!(
 shard_id = self.config.shard_id,
 epoch_ms = prev_ms,
 "unique-id offset counter wrapped within the same millisecond"
 );
 }
 // Force the id forward by one virtual millisecond so the
 // wrap still yields a strictly increasing value.
 (prev_ms + 1, 0)
 } else {
 (prev_ms, next_offset)
 }
 };

 let new_state = (ms << OFFSET_BITS) | offset;
 if self
.state
.compare_exchange_weak(prev, new_state, Ordering::AcqRel, Ordering::Relaxed)
.is_ok()
 {
 return ((ms << (OFFSET_BITS + SHARD_BITS))
 | (offset << SHARD_BITS)
 | self.config.shard_id as u64) as i64;
 }
 }
 }

 pub fn shard_id(&self) -> u8 {
 self.config.shard_id
 }
}

#[cfg(test)]
mod tests {
 use super::*;
 use std::sync::Arc;
 use std::thread;

 #[test]
 fn ids_are_positive_and_carry_the_shard_id() {
 let gen = UniqueIdGenerator::new(UniqueIdConfig { shard_id: 42,..Default::default() });
 for _ in 0..10 {
 let id = gen.next_id();
 assert!(id > 0);
 assert_eq!(id & (SHARD_MASK as i64), 42);
 }
 }

 #[test]
 fn ids_are_strictly_increasing_single_threaded() {
 let gen = UniqueIdGenerator::new(UniqueIdConfig::default());
 let mut prev = gen.next_id();
 for _ in 0..5000 {
 let id = gen.next_id();
 assert!(id > prev, "{id} did not exceed {prev}");
 prev = id;
 }
 }

 #[test]
 fn ids_are_strictly_increasing_across_threads() {
 let gen = Arc::new(UniqueIdGenerator::new(UniqueIdConfig { shard_id: 1,..Default::default() }));
 let mut handles = Vec::new();
 for _ in 0..8 {
 let gen = Arc::clone(&gen);
 handles.push(thread::spawn(move || {
 (0..2000).map(|_| gen.next_id()).collect::<Vec<_>>()
 }));
 }
 let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
 let unique_count = {
 let mut sorted = all.clone();
 sorted.sort_unstable();
 sorted.dedup();
 sorted.len()
 };
 assert_eq!(unique_count, all.len(), "ids must be unique across threads");
 all.sort_unstable();
 assert!(all.windows(2).all(|w| w[0] < w[1]));
 }

 #[test]
 fn rejects_out_of_range_shard_id() {
 let result = std::panic::catch_unwind(|| {
 UniqueIdGenerator::new(UniqueIdConfig { shard_id: 128,..Default::default() })
 });
 assert!(result.is_err());
 }
}
