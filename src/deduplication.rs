// ============================================================================
// Notification Deduplication
// ============================================================================
//
// The mail provider may redeliver a notification, possibly while the first
// delivery is still being processed. The processor claims a message id
// before fetching; a second claim fails while the id is in flight or after
// it was processed.
//
// Flow:
// 1. try_claim(message_id) -> false means duplicate, skip
// 2. ...fetch, extract, append...
// 3. mark_processed(message_id) on success, release(message_id) on failure
//
// Released ids stay retryable on the next redelivery.
//
// ============================================================================

use async_trait::async_trait;
use mailhook_error::AppResult;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Message ids whose rows were appended or are being appended
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn is_processed(&self, message_id: &str) -> AppResult<bool>;

    /// Atomically reserve `message_id` for processing
    ///
    /// Returns `false` if it is already processed or claimed by another run.
    async fn try_claim(&self, message_id: &str) -> AppResult<bool>;

    /// Give up a claim so a later redelivery can retry
    async fn release(&self, message_id: &str) -> AppResult<()>;

    /// Record a processed id, turning any claim on it into a mark
    async fn mark_processed(&self, message_id: &str) -> AppResult<()>;
}

struct Marked {
    seq: u64,
    marked_at: Instant,
}

#[derive(Default)]
struct Entries {
    next_seq: u64,
    seen: HashMap<String, u64>,
    // Insertion order, used for expiry and capacity eviction
    order: VecDeque<(String, Marked)>,
    in_flight: HashSet<String>,
}

/// Process-local store with a TTL and a bounded entry count
pub struct InMemoryIdempotencyStore {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<Entries>,
}

impl InMemoryIdempotencyStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn prune(&self, entries: &mut Entries, now: Instant) {
        while let Some((id, marked)) = entries.order.front() {
            let expired = now.duration_since(marked.marked_at) >= self.ttl;
            let over_capacity = entries.order.len() > self.max_entries;
            if !expired && !over_capacity {
                break;
            }

            // Only drop the map entry if it was not re-marked later
            if entries.seen.get(id) == Some(&marked.seq) {
                entries.seen.remove(id);
            }
            entries.order.pop_front();
        }
    }

    fn insert(&self, entries: &mut Entries, message_id: &str, now: Instant) {
        let seq = entries.next_seq;
        entries.next_seq += 1;

        entries.seen.insert(message_id.to_string(), seq);
        entries.order.push_back((
            message_id.to_string(),
            Marked {
                seq,
                marked_at: now,
            },
        ));
    }

    pub async fn len(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries, Instant::now());
        entries.seen.len()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn is_processed(&self, message_id: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries, now);

        Ok(entries.seen.contains_key(message_id))
    }

    async fn try_claim(&self, message_id: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries, now);

        if entries.seen.contains_key(message_id) {
            return Ok(false);
        }
        Ok(entries.in_flight.insert(message_id.to_string()))
    }

    async fn release(&self, message_id: &str) -> AppResult<()> {
        self.entries.lock().await.in_flight.remove(message_id);
        Ok(())
    }

    async fn mark_processed(&self, message_id: &str) -> AppResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        entries.in_flight.remove(message_id);
        self.insert(&mut entries, message_id, now);
        self.prune(&mut entries, now);

        tracing::debug!(message_id = %message_id, "Marked message as processed");
        Ok(())
    }
}
