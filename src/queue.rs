//! Time-bounded FIFO queue between the demultiplexer and one consumer.
//!
//! Every enqueued chunk carries an expiry (`now + TTL`). Reads skip anything
//! already expired, so a slow consumer can never "catch up" by replaying
//! minutes-old bytes as if they were live — for a differential-GPS relay,
//! stale correction data is worse than no data. A background pruning task
//! bounds memory growth when nobody consumes a protocol at all.

use crate::error::{MuxError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::trace;

struct State {
    /// Chunks with their expiry instants. TTL is constant, so expiries are
    /// non-decreasing and staleness pruning only ever touches the front.
    items: VecDeque<(Bytes, Instant)>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
    ttl: Duration,
}

impl Shared {
    fn drop_expired(state: &mut State, now: Instant) -> usize {
        let mut dropped = 0;
        while let Some((_, expires_at)) = state.items.front() {
            if *expires_at <= now {
                state.items.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }
        dropped
    }
}

/// Producer half. Enqueueing never blocks and never rejects.
pub struct TtlSender {
    shared: Arc<Shared>,
}

/// Consumer half; single consumer per queue.
pub struct TtlReceiver {
    shared: Arc<Shared>,
}

/// Creates a TTL queue pair and spawns its background pruner.
///
/// The pruner sleeps for the remaining TTL of the oldest item (the full TTL
/// when empty), prunes, and recomputes — adaptive rather than fixed-interval.
/// It exits once both halves are dropped or the queue is closed and drained.
pub fn ttl_queue(ttl: Duration) -> (TtlSender, TtlReceiver) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            items: VecDeque::new(),
            closed: false,
        }),
        notify: Notify::new(),
        ttl,
    });

    spawn_pruner(Arc::downgrade(&shared));

    (
        TtlSender {
            shared: shared.clone(),
        },
        TtlReceiver { shared },
    )
}

fn spawn_pruner(weak: Weak<Shared>) {
    tokio::spawn(async move {
        loop {
            let sleep_for = {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let mut state = shared.state.lock();
                let now = Instant::now();
                let dropped = Shared::drop_expired(&mut state, now);
                if dropped > 0 {
                    trace!(dropped, "pruned stale queue items");
                }
                if state.closed && state.items.is_empty() {
                    break;
                }
                state
                    .items
                    .front()
                    .map(|(_, expires_at)| expires_at.saturating_duration_since(now))
                    .unwrap_or(shared.ttl)
            };
            tokio::time::sleep(sleep_for).await;
        }
    });
}

impl TtlSender {
    /// Appends a chunk with a fresh expiry. Never blocks; a closed queue
    /// silently drops the chunk (the consumer is already being told the
    /// stream ended).
    pub fn put(&self, chunk: Bytes) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            let expires_at = Instant::now() + self.shared.ttl;
            state.items.push_back((chunk, expires_at));
        }
        self.shared.notify.notify_one();
    }

    /// Marks the queue closed and wakes any blocked getter so it observes
    /// end-of-stream instead of hanging. Already-enqueued fresh chunks stay
    /// readable until drained or expired.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
        }
        self.shared.notify.notify_waiters();
        self.shared.notify.notify_one();
    }
}

impl Drop for TtlSender {
    fn drop(&mut self) {
        self.close();
    }
}

impl TtlReceiver {
    /// Returns the oldest fresh chunk, blocking up to `timeout`.
    ///
    /// Expired chunks reached along the way are discarded, never returned.
    /// A quiet timeout yields an **empty** chunk — not an error, since
    /// line-oriented consumers treat an empty read as "try again". Returns
    /// [`MuxError::ChannelClosed`] once the queue is closed and drained.
    pub async fn get(&mut self, timeout: Duration) -> Result<Bytes> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);

            {
                let mut state = self.shared.state.lock();
                Shared::drop_expired(&mut state, Instant::now());
                if let Some((chunk, _)) = state.items.pop_front() {
                    return Ok(chunk);
                }
                if state.closed {
                    return Err(MuxError::ChannelClosed);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Bytes::new());
            }
        }
    }

    /// True once the queue is closed and fully drained.
    pub fn is_terminated(&self) -> bool {
        let state = self.shared.state.lock();
        state.closed && state.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn queue_len(rx: &TtlReceiver) -> usize {
        rx.shared.state.lock().items.len()
    }

    #[tokio::test]
    async fn test_put_get_fifo() {
        let (tx, mut rx) = ttl_queue(Duration::from_secs(1));
        tx.put(Bytes::from_static(b"one"));
        tx.put(Bytes::from_static(b"two"));

        assert_eq!(rx.get(Duration::from_millis(50)).await.unwrap(), "one");
        assert_eq!(rx.get(Duration::from_millis(50)).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_quiet_timeout_returns_empty() {
        let (_tx, mut rx) = ttl_queue(Duration::from_secs(1));
        let start = Instant::now();
        let chunk = rx.get(Duration::from_millis(30)).await.unwrap();
        assert!(chunk.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(30));
        // Does not block meaningfully past the timeout
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_expired_items_never_returned() {
        let (tx, mut rx) = ttl_queue(Duration::from_millis(20));
        tx.put(Bytes::from_static(b"stale"));
        tokio::time::sleep(Duration::from_millis(40)).await;

        let chunk = rx.get(Duration::from_millis(10)).await.unwrap();
        assert!(chunk.is_empty(), "expired item must be discarded, not read");
    }

    #[tokio::test]
    async fn test_fresh_item_survives_stale_prefix() {
        let (tx, mut rx) = ttl_queue(Duration::from_millis(50));
        tx.put(Bytes::from_static(b"stale"));
        tokio::time::sleep(Duration::from_millis(70)).await;
        tx.put(Bytes::from_static(b"fresh"));

        assert_eq!(rx.get(Duration::from_millis(50)).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_get_wakes_on_put() {
        let (tx, mut rx) = ttl_queue(Duration::from_secs(1));
        let getter = tokio::spawn(async move { rx.get(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.put(Bytes::from_static(b"late"));

        let chunk = tokio::time::timeout(Duration::from_secs(1), getter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(chunk, "late");
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_getter() {
        let (tx, mut rx) = ttl_queue(Duration::from_secs(1));
        let getter = tokio::spawn(async move { rx.get(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.close();

        let res = tokio::time::timeout(Duration::from_secs(1), getter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(res, Err(MuxError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_close_drains_fresh_items_first() {
        let (tx, mut rx) = ttl_queue(Duration::from_secs(1));
        tx.put(Bytes::from_static(b"last"));
        tx.close();

        assert_eq!(rx.get(Duration::from_millis(50)).await.unwrap(), "last");
        assert!(matches!(
            rx.get(Duration::from_millis(50)).await,
            Err(MuxError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_background_pruner_bounds_unconsumed_queue() {
        let (tx, rx) = ttl_queue(Duration::from_millis(20));
        for _ in 0..100 {
            tx.put(Bytes::from_static(b"x"));
        }
        assert_eq!(queue_len(&rx), 100);

        // Nobody calls get; the pruner alone must drain the stale items.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(queue_len(&rx), 0);
    }
}
