//! Per-device notification buffering.
//!
//! Each [`DeviceSession`](crate::session::DeviceSession) owns one
//! [`NotificationBuffer`]: a FIFO queue of pushed payloads plus the set of
//! armed (service, characteristic) tuples. The session's appender task is
//! the only producer; drain callers are the only consumers. A record is
//! delivered to at most one drain caller, and records for one device are
//! delivered in arrival order.
//!
//! Arming is tracked by the full (service, characteristic) tuple rather
//! than a single per-device flag, so arming a second characteristic on an
//! already-armed device subscribes it instead of silently doing nothing.

use std::collections::{HashSet, VecDeque};

use tokio::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

use gattway_types::NotificationRecord;

/// FIFO queue of pushed payloads with tuple-keyed arming state.
#[derive(Debug, Default)]
pub struct NotificationBuffer {
    inner: Mutex<BufferState>,
}

#[derive(Debug, Default)]
struct BufferState {
    /// Armed (service, characteristic) tuples.
    armed: HashSet<(Uuid, Uuid)>,
    /// Buffered records, oldest first.
    queue: VecDeque<NotificationRecord>,
}

impl NotificationBuffer {
    /// Create an empty, unarmed buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a (service, characteristic) tuple.
    ///
    /// Returns `true` if the tuple was newly armed, `false` if it was
    /// already armed (idempotent no-op).
    pub async fn arm(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.inner.lock().await.armed.insert((service, characteristic))
    }

    /// Undo a failed arm without touching buffered records.
    pub async fn disarm_tuple(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.inner.lock().await.armed.remove(&(service, characteristic))
    }

    /// Whether a tuple is currently armed.
    pub async fn is_armed(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.inner.lock().await.armed.contains(&(service, characteristic))
    }

    /// Disarm everything and discard the whole queue.
    ///
    /// Returns the tuples that were armed so the caller can unsubscribe
    /// them at the driver. Buffered-but-undelivered records for any
    /// characteristic on the device are lost, whichever tuple queued them.
    pub async fn disarm_all(&self) -> Vec<(Uuid, Uuid)> {
        let mut state = self.inner.lock().await;
        let dropped = state.queue.len();
        state.queue.clear();
        let tuples: Vec<_> = state.armed.drain().collect();
        trace!(dropped, disarmed = tuples.len(), "cleared notification buffer");
        tuples
    }

    /// Append a pushed record if its tuple is armed.
    ///
    /// Called by the session's appender task. Records for unarmed tuples
    /// are dropped; returns whether the record was kept.
    pub async fn append(&self, record: NotificationRecord) -> bool {
        let mut state = self.inner.lock().await;
        if !state
            .armed
            .contains(&(record.service_uuid, record.characteristic_uuid))
        {
            trace!(
                characteristic = %record.characteristic_uuid,
                "dropping push for unarmed characteristic"
            );
            return false;
        }
        state.queue.push_back(record);
        true
    }

    /// Atomically remove and return all records matching the filter,
    /// oldest first.
    ///
    /// Drained records cannot be drained again. An empty result is
    /// returned as an empty vec; the caller decides how to surface it.
    pub async fn drain(&self, service: Uuid, characteristic: Uuid) -> Vec<NotificationRecord> {
        let mut state = self.inner.lock().await;
        let mut matched = Vec::new();
        let mut kept = VecDeque::with_capacity(state.queue.len());
        for record in state.queue.drain(..) {
            if record.matches(service, characteristic) {
                matched.push(record);
            } else {
                kept.push_back(record);
            }
        }
        state.queue = kept;
        matched
    }

    /// Number of buffered records across all tuples.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Whether the buffer holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
