// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Disk-access counter and its live stream.
//!
//! The counter is bumped once per successful persistent-tier read and reset
//! by [`crate::TieredCache::clear`]. Every change is broadcast; a subscriber
//! sees only values published after it subscribed. The stream ends when the
//! cache shuts down or is dropped.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::trace;

/// Counter plus broadcast sender. Mutators are crate-private and are only
/// called with the cache's state lock held, which orders the emissions.
#[derive(Debug, Default)]
pub struct AccessCounter {
    value: AtomicU64,
    sender: RwLock<Option<broadcast::Sender<u64>>>,
}

impl AccessCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value (snapshot).
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Whether a broadcast channel is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Subscribe to future values. Returns an already-finished stream
    /// when the channel is closed.
    #[must_use]
    pub fn subscribe(&self) -> AccessStream {
        let inner = self
            .sender
            .read()
            .as_ref()
            .map(|tx| BroadcastStream::new(tx.subscribe()));
        AccessStream { inner }
    }

    pub(crate) fn open(&self, capacity: usize) {
        let (tx, _) = broadcast::channel(capacity.max(1));
        // Replacing an old sender drops it, which ends its subscribers' streams.
        *self.sender.write() = Some(tx);
    }

    pub(crate) fn close(&self) {
        self.sender.write().take();
    }

    pub(crate) fn increment(&self) -> u64 {
        let next = self.value.fetch_add(1, Ordering::AcqRel) + 1;
        self.publish(next);
        next
    }

    pub(crate) fn reset(&self) {
        self.value.store(0, Ordering::Release);
        self.publish(0);
    }

    fn publish(&self, value: u64) {
        if let Some(tx) = self.sender.read().as_ref() {
            // No subscribers is not an error.
            let _ = tx.send(value);
        }
    }
}

/// Live stream of disk-access counts.
#[derive(Debug)]
pub struct AccessStream {
    inner: Option<BroadcastStream<u64>>,
}

impl Stream for AccessStream {
    type Item = u64;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u64>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        loop {
            match Pin::new(&mut *inner).poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(value)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    trace!(skipped, "Access stream subscriber lagged");
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscriber_sees_only_future_values() {
        let counter = AccessCounter::new();
        counter.open(8);
        counter.increment();

        let stream = counter.subscribe();
        counter.increment();
        counter.increment();
        counter.close();

        let seen: Vec<u64> = stream.collect().await;
        assert_eq!(seen, vec![2, 3]);
        assert_eq!(counter.get(), 3);
    }

    #[tokio::test]
    async fn test_reset_publishes_zero() {
        let counter = AccessCounter::new();
        counter.open(8);
        let mut stream = counter.subscribe();

        counter.increment();
        counter.reset();
        counter.close();

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(0));
        assert_eq!(stream.next().await, None);
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_while_closed_ends_immediately() {
        let counter = AccessCounter::new();
        assert!(!counter.is_open());

        let mut stream = counter.subscribe();
        assert_eq!(stream.next().await, None);

        // Counting still works without a channel.
        assert_eq!(counter.increment(), 1);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_to_newest() {
        let counter = AccessCounter::new();
        counter.open(2);
        let stream = counter.subscribe();

        for _ in 0..10 {
            counter.increment();
        }
        counter.close();

        let seen: Vec<u64> = stream.collect().await;
        assert_eq!(seen, vec![9, 10]);
    }

    #[tokio::test]
    async fn test_reopen_ends_old_subscribers() {
        let counter = AccessCounter::new();
        counter.open(4);
        let mut old = counter.subscribe();

        counter.open(4);
        counter.increment();

        assert_eq!(old.next().await, None);
    }
}
