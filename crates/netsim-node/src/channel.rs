//! Interface queues — the only state shared between scheduling units.
//!
//! A `BoundedChannel` is a FIFO of encoded frames with an optional depth
//! limit. Each direction of each interface has exactly one producer and one
//! consumer, so the internal mutex is the whole locking discipline.
//!
//! Consumers only ever `try_get`. Producers either `try_put` (attempt and
//! report) or, at the origin host only, `put().await`, which waits for room.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel full ({capacity} frames queued)")]
    Full { capacity: usize },
}

/// FIFO of encoded frames. Capacity 0 means unbounded.
#[derive(Debug)]
pub struct BoundedChannel {
    frames: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    space: Notify,
}

impl BoundedChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            capacity,
            space: Notify::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Depth limit, or `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Enqueue without waiting. Fails immediately if the channel is full.
    pub fn try_put(&self, frame: Bytes) -> Result<(), ChannelError> {
        self.offer(frame).map_err(|_| ChannelError::Full {
            capacity: self.capacity,
        })
    }

    /// Enqueue, waiting for a consumer to make room if necessary.
    pub async fn put(&self, frame: Bytes) {
        let mut frame = frame;
        loop {
            let room = self.space.notified();
            match self.offer(frame) {
                Ok(()) => return,
                Err(rejected) => frame = rejected,
            }
            room.await;
        }
    }

    /// Dequeue the oldest frame, if any. Never waits.
    pub fn try_get(&self) -> Option<Bytes> {
        let frame = self.lock().pop_front();
        if frame.is_some() {
            self.space.notify_one();
        }
        frame
    }

    fn offer(&self, frame: Bytes) -> Result<(), Bytes> {
        let mut frames = self.lock();
        if self.capacity > 0 && frames.len() >= self.capacity {
            return Err(frame);
        }
        frames.push_back(frame);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One direction of a node interface: a queue plus the MTU of the link
/// attached to it. The MTU is unset until a link binds the interface.
#[derive(Debug)]
pub struct Interface {
    queue: BoundedChannel,
    mtu: AtomicUsize,
}

impl Interface {
    pub fn new(depth: usize) -> Self {
        Self {
            queue: BoundedChannel::new(depth),
            mtu: AtomicUsize::new(0),
        }
    }

    pub fn mtu(&self) -> Option<usize> {
        match self.mtu.load(Ordering::Acquire) {
            0 => None,
            mtu => Some(mtu),
        }
    }

    pub fn set_mtu(&self, mtu: usize) {
        self.mtu.store(mtu, Ordering::Release);
    }

    pub fn depth(&self) -> Option<usize> {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn try_put(&self, frame: Bytes) -> Result<(), ChannelError> {
        self.queue.try_put(frame)
    }

    pub async fn put(&self, frame: Bytes) {
        self.queue.put(frame).await
    }

    pub fn try_get(&self) -> Option<Bytes> {
        self.queue.try_get()
    }
}
