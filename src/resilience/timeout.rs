// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Deadline guard with an exactly-once result.
//!
//! A [`TimeoutGuard`] races one operation against a timer and an optional
//! external cancel. Whichever trigger flips the resolution slot from
//! `PENDING` to `RESOLVED` delivers its outcome; every other trigger finds
//! the slot claimed and does nothing. Once the waiter has its outcome the
//! timer and operation tasks are aborted.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tiered_cache::resilience::timeout::{TimeoutGuard, GuardError};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let guard = TimeoutGuard::new(Duration::from_secs(1), || async {
//!     Ok::<_, std::io::Error>(42)
//! });
//! assert_eq!(guard.value().await.unwrap(), 42);
//!
//! let slow = TimeoutGuard::new(Duration::from_millis(10), || async {
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     Ok::<_, std::io::Error>(0)
//! });
//! assert!(matches!(slow.value().await, Err(GuardError::Timeout(_))));
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::trace;

const PENDING: u8 = 0;
const RESOLVED: u8 = 1;

#[derive(Error, Debug)]
pub enum GuardError<E> {
    #[error("The operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("The operation was cancelled")]
    Cancelled,
    #[error("The operation failed: {0}")]
    Operation(E),
}

impl<E> GuardError<E> {
    /// Short label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Operation(_) => "error",
        }
    }
}

type Outcome<T, E> = Result<T, GuardError<E>>;
type BoxedOperation<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Single-assignment outcome holder shared by the three triggers.
struct ResolutionSlot<T, E> {
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<Outcome<T, E>>>>,
}

impl<T, E> ResolutionSlot<T, E> {
    fn new(sender: oneshot::Sender<Outcome<T, E>>) -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Deliver `outcome` if nobody has yet. Returns whether this call won.
    fn resolve(&self, outcome: Outcome<T, E>) -> bool {
        if self
            .state
            .compare_exchange(PENDING, RESOLVED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Some(tx) = self.sender.lock().take() {
            // The waiter may already be gone (value() future dropped).
            let _ = tx.send(outcome);
        }
        true
    }

    fn is_resolved(&self) -> bool {
        self.state.load(Ordering::Acquire) == RESOLVED
    }
}

trait CancelSlot: Send + Sync {
    fn cancel(&self) -> bool;
    fn is_resolved(&self) -> bool;
}

impl<T: Send, E: Send> CancelSlot for ResolutionSlot<T, E> {
    fn cancel(&self) -> bool {
        self.resolve(Err(GuardError::Cancelled))
    }

    fn is_resolved(&self) -> bool {
        ResolutionSlot::is_resolved(self)
    }
}

/// Cloneable handle that cancels a [`TimeoutGuard`] from another task.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Arc<dyn CancelSlot>,
}

impl CancelHandle {
    /// Request cancellation. Returns `false` when the guard had already
    /// resolved, in which case nothing happens.
    pub fn cancel(&self) -> bool {
        let won = self.slot.cancel();
        trace!(won, "Timeout guard cancel requested");
        won
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Runs one operation under a wall-clock deadline.
///
/// The operation does not start until [`value`](Self::value) is awaited.
pub struct TimeoutGuard<T, E> {
    duration: Duration,
    operation: BoxedOperation<T, E>,
    slot: Arc<ResolutionSlot<T, E>>,
    receiver: oneshot::Receiver<Outcome<T, E>>,
}

impl<T, E> TimeoutGuard<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new<F, Fut>(duration: Duration, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        Self {
            duration,
            operation: Box::pin(async move { operation().await }),
            slot: Arc::new(ResolutionSlot::new(tx)),
            receiver: rx,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { slot: self.slot.clone() }
    }

    /// Cancel before or while [`value`](Self::value) runs. No-op once resolved.
    pub fn cancel(&self) -> bool {
        self.slot.resolve(Err(GuardError::Cancelled))
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }

    /// Wait for the first of: operation completion, deadline, cancellation.
    pub async fn value(self) -> Outcome<T, E> {
        let Self { duration, operation, slot, receiver } = self;

        // Cancelled before we started; don't spawn anything.
        if slot.is_resolved() {
            return finish(receiver.await);
        }

        let mut tasks = JoinSet::new();

        let timer_slot = slot.clone();
        tasks.spawn(async move {
            tokio::time::sleep(duration).await;
            if timer_slot.resolve(Err(GuardError::Timeout(duration))) {
                trace!(?duration, "Timeout guard deadline fired");
            }
        });

        let op_slot = slot.clone();
        tasks.spawn(async move {
            let outcome = operation.await.map_err(GuardError::Operation);
            op_slot.resolve(outcome);
        });

        let outcome = finish(receiver.await);
        // Stop whichever trigger lost.
        tasks.abort_all();
        outcome
    }
}

fn finish<T, E>(received: Result<Outcome<T, E>, oneshot::error::RecvError>) -> Outcome<T, E> {
    // The slot holds the only sender and lives as long as the guard, so a
    // closed channel means every trigger went away without resolving.
    let outcome = received.unwrap_or(Err(GuardError::Cancelled));
    crate::metrics::record_guard_outcome(match &outcome {
        Ok(_) => "success",
        Err(e) => e.kind(),
    });
    outcome
}

/// Run `operation` with a deadline. Shorthand for
/// `TimeoutGuard::new(duration, operation).value().await`.
pub async fn with_timeout<T, E, F, Fut>(duration: Duration, operation: F) -> Outcome<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    TimeoutGuard::new(duration, operation).value().await
}
