//! Durable FIFO queues used for the store's notifier/listener feed.
//! A notifier delivers each committed
//! [`VersionedValue`] to a listener at least once, even across a process
//! restart; `commit`/`rollback` let a listener bound how much gets
//! redelivered after a crash.

pub mod durable;

use crate::error::Result;
use crate::model::VersionedValue;

/// Contract shared by every notifier/listener queue implementation.
pub trait Queue: Send + Sync {
    /// Enqueues a value for delivery. Never blocks; a full durable queue
    /// returns an error rather than stalling the writer committing the
    /// update.
    fn send(&self, versioned: VersionedValue) -> Result<()>;

    /// Returns up to `limit` undelivered values without removing them
    /// from the queue, each one joining the set in flight until it is
    /// resolved by `commit`/`rollback`. `timeout_ms` governs how long to
    /// wait when nothing is pending: negative waits indefinitely, zero
    /// polls and returns immediately (possibly empty), positive waits up
    /// to that many milliseconds. Returns `Err(PointError::Cancelled)`
    /// if the queue is closed and drained, whether that was already true
    /// or became true while waiting.
    fn receive(&self, limit: usize, timeout_ms: i64) -> Result<Vec<VersionedValue>>;

    /// Acknowledges delivery of the in-flight value with this version.
    /// Fails if no such version is in flight.
    fn commit(&self, version: u64) -> Result<()>;

    /// Returns every value currently in flight to the front of the
    /// queue, in original order, for redelivery.
    fn rollback(&self);

    /// Discards every queued value, delivered or not. Returns the number
    /// of values discarded.
    fn purge(&self) -> Result<u64>;

    /// Number of values still pending delivery or acknowledgement.
    fn len(&self) -> usize;

    /// Closes the queue: wakes any blocked `receive` calls so they
    /// observe `Cancelled` once drained, and causes future `receive`
    /// calls on an empty queue to do the same rather than block.
    fn close(&self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
