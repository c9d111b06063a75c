//! Process-wide rate limiting for queue-bound edges.
//!
//! A [`QueueLimiter`] is shared by every run in the process. Each configured
//! queue enforces up to three independent sliding windows: messages per
//! second, requests per minute, and unit cost per minute. When a queue
//! declares weighted sub-queues, each sub-queue receives a proportional slice
//! of the parent budget and every grant debits both the sub-queue and the
//! parent, so the aggregate never exceeds the parent's windows.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::spec::{BandwidthSpec, QueueSpec};

/// Outcome of asking to cross a rate-limited edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// The grant was admitted and debited.
    Allowed,
    /// Retry after the given duration; the binding window will have drained.
    MustWait(Duration),
    /// The request can never be admitted (zero budget, or a cost estimate
    /// larger than a full window).
    Denied,
}

/// Per-queue limit configuration, one field per window dimension.
///
/// `None` leaves a dimension unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_messages_per_second: Option<u32>,
    pub max_requests_per_minute: Option<u32>,
    pub max_cost_per_minute: Option<u64>,
}

impl QueueLimits {
    /// No limits on any dimension.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// This configuration scaled to a proportional share of the budget.
    ///
    /// A non-zero limit never scales below one unit, so every weighted
    /// destination retains progress; the parent windows still cap the
    /// aggregate.
    #[must_use]
    fn scaled(&self, share: f64) -> Self {
        fn scale_u32(cap: u32, share: f64) -> u32 {
            if cap == 0 {
                0
            } else {
                ((f64::from(cap) * share).floor() as u32).max(1)
            }
        }
        fn scale_u64(cap: u64, share: f64) -> u64 {
            if cap == 0 {
                0
            } else {
                ((cap as f64 * share).floor() as u64).max(1)
            }
        }
        Self {
            max_messages_per_second: self.max_messages_per_second.map(|c| scale_u32(c, share)),
            max_requests_per_minute: self.max_requests_per_minute.map(|c| scale_u32(c, share)),
            max_cost_per_minute: self.max_cost_per_minute.map(|c| scale_u64(c, share)),
        }
    }
}

impl From<&BandwidthSpec> for QueueLimits {
    fn from(bandwidth: &BandwidthSpec) -> Self {
        Self {
            max_messages_per_second: bandwidth.max_messages_per_second,
            max_requests_per_minute: bandwidth.max_requests_per_minute,
            max_cost_per_minute: bandwidth.max_cost_per_minute,
        }
    }
}

/// One sliding window: admitted entries and their expiry bookkeeping.
#[derive(Debug)]
struct Window {
    capacity: u64,
    duration: Duration,
    entries: VecDeque<(Instant, u64)>,
    total: u64,
}

impl Window {
    fn new(capacity: u64, duration: Duration) -> Self {
        Self {
            capacity,
            duration,
            entries: VecDeque::new(),
            total: 0,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&(when, weight)) = self.entries.front() {
            if now.saturating_duration_since(when) < self.duration {
                break;
            }
            self.entries.pop_front();
            self.total -= weight;
        }
    }

    fn decide(&mut self, now: Instant, weight: u64) -> Acquire {
        self.prune(now);
        if weight > self.capacity {
            return Acquire::Denied;
        }
        if self.total + weight <= self.capacity {
            return Acquire::Allowed;
        }
        // Walk from the oldest entry until enough budget has drained.
        let mut freed = 0;
        for &(when, entry_weight) in &self.entries {
            freed += entry_weight;
            if self.total - freed + weight <= self.capacity {
                let expiry = when + self.duration;
                return Acquire::MustWait(expiry.saturating_duration_since(now));
            }
        }
        Acquire::Denied
    }

    fn debit(&mut self, now: Instant, weight: u64) {
        self.entries.push_back((now, weight));
        self.total += weight;
    }
}

#[derive(Debug)]
struct QueueState {
    parent: Option<String>,
    messages: Option<Window>,
    requests: Option<Window>,
    cost: Option<Window>,
}

impl QueueState {
    fn new(limits: QueueLimits, parent: Option<String>) -> Self {
        Self {
            parent,
            messages: limits
                .max_messages_per_second
                .map(|c| Window::new(u64::from(c), Duration::from_secs(1))),
            requests: limits
                .max_requests_per_minute
                .map(|c| Window::new(u64::from(c), Duration::from_secs(60))),
            cost: limits
                .max_cost_per_minute
                .map(|c| Window::new(c, Duration::from_secs(60))),
        }
    }

    fn decide(&mut self, now: Instant, cost: u64) -> Acquire {
        let mut outcome = Acquire::Allowed;
        if let Some(window) = &mut self.messages {
            outcome = worst(outcome, window.decide(now, 1));
        }
        if let Some(window) = &mut self.requests {
            outcome = worst(outcome, window.decide(now, 1));
        }
        if let Some(window) = &mut self.cost {
            outcome = worst(outcome, window.decide(now, cost));
        }
        outcome
    }

    fn debit(&mut self, now: Instant, cost: u64) {
        if let Some(window) = &mut self.messages {
            window.debit(now, 1);
        }
        if let Some(window) = &mut self.requests {
            window.debit(now, 1);
        }
        if let Some(window) = &mut self.cost {
            window.debit(now, cost);
        }
    }
}

/// The most restrictive of two outcomes.
fn worst(a: Acquire, b: Acquire) -> Acquire {
    match (a, b) {
        (Acquire::Denied, _) | (_, Acquire::Denied) => Acquire::Denied,
        (Acquire::MustWait(x), Acquire::MustWait(y)) => Acquire::MustWait(x.max(y)),
        (Acquire::MustWait(w), Acquire::Allowed) | (Acquire::Allowed, Acquire::MustWait(w)) => {
            Acquire::MustWait(w)
        }
        (Acquire::Allowed, Acquire::Allowed) => Acquire::Allowed,
    }
}

/// Shared sliding-window limiter keyed by queue id.
///
/// Safe to call from any number of concurrent runs; every decision and debit
/// happens under one lock, so grants are atomic.
#[derive(Debug, Default)]
pub struct QueueLimiter {
    queues: Mutex<FxHashMap<String, QueueState>>,
}

impl QueueLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a queue and its sub-queues.
    ///
    /// The first configuration of an id wins: window history is process-wide
    /// state shared across runs, so a run re-registering a known queue must
    /// not reset the counters already accumulated by its peers.
    pub fn configure(&self, queue: &QueueSpec) {
        let limits = queue
            .bandwidth
            .as_ref()
            .map(QueueLimits::from)
            .unwrap_or_else(QueueLimits::unlimited);

        let mut queues = self.queues.lock();
        queues
            .entry(queue.id.clone())
            .or_insert_with(|| QueueState::new(limits, None));

        let total_weight: f64 = queue.sub_queues.iter().map(|s| s.weight.max(0.0)).sum();
        for sub in &queue.sub_queues {
            let share = if total_weight > 0.0 {
                sub.weight.max(0.0) / total_weight
            } else {
                1.0 / queue.sub_queues.len() as f64
            };
            queues
                .entry(sub.id.clone())
                .or_insert_with(|| QueueState::new(limits.scaled(share), Some(queue.id.clone())));
        }
    }

    /// Registers every queue in an iterator. See [`configure`](Self::configure).
    pub fn configure_all<'a>(&self, queues: impl IntoIterator<Item = &'a QueueSpec>) {
        for queue in queues {
            self.configure(queue);
        }
    }

    #[must_use]
    pub fn is_configured(&self, queue_id: &str) -> bool {
        self.queues.lock().contains_key(queue_id)
    }

    /// Asks to admit one operation of the given cost on a queue.
    ///
    /// Unknown queue ids are unthrottled. An [`Acquire::Allowed`] outcome has
    /// already debited the windows; [`Acquire::MustWait`] and
    /// [`Acquire::Denied`] debit nothing.
    #[instrument(level = "debug", skip(self))]
    pub fn acquire(&self, queue_id: &str, cost: u64) -> Acquire {
        self.acquire_at(Instant::now(), queue_id, cost)
    }

    /// [`acquire`](Self::acquire) against an explicit clock, for tests and
    /// callers that batch decisions at one instant.
    pub fn acquire_at(&self, now: Instant, queue_id: &str, cost: u64) -> Acquire {
        let mut queues = self.queues.lock();

        let parent_id = match queues.get_mut(queue_id) {
            Some(state) => {
                let own = state.decide(now, cost);
                if own != Acquire::Allowed {
                    return own;
                }
                state.parent.clone()
            }
            None => return Acquire::Allowed,
        };

        if let Some(parent_id) = &parent_id {
            if let Some(parent) = queues.get_mut(parent_id) {
                let upstream = parent.decide(now, cost);
                if upstream != Acquire::Allowed {
                    return upstream;
                }
                parent.debit(now, cost);
            }
        }
        if let Some(state) = queues.get_mut(queue_id) {
            state.debit(now, cost);
        }
        Acquire::Allowed
    }
}
