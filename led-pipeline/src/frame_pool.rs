//! Fixed pool of reusable frames with a return queue
//!
//! Every frame is allocated once at construction. The source acquires frames
//! from the return queue, the last pipeline stage sends them back through the
//! recycler, so steady-state streaming never allocates.

use crate::frame::FrameBuffer;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct FramePool {
    return_tx: Sender<FrameBuffer>,
    return_rx: Receiver<FrameBuffer>,
    pixel_count: usize,
    capacity: usize,
    next_sequence: AtomicU64,
}

impl FramePool {
    /// Create a new frame pool
    ///
    /// # Arguments
    /// * `pixel_count` - Pixels per frame
    /// * `capacity` - Number of frames circulating through the pipeline
    pub fn new(pixel_count: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (return_tx, return_rx) = channel::bounded(capacity);

        for _ in 0..capacity {
            // Cannot fail: the queue is sized for every frame and we hold both ends
            let _ = return_tx.send(FrameBuffer::new(pixel_count));
        }

        FramePool {
            return_tx,
            return_rx,
            pixel_count,
            capacity,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a frame is returned
    ///
    /// The pool keeps its own sender alive, so this only yields `None` if the
    /// queue is torn down underneath it.
    pub fn acquire(&self) -> Option<FrameBuffer> {
        self.return_rx.recv().ok().map(|frame| self.stamp(frame))
    }

    /// Take a frame if one is waiting
    pub fn try_acquire(&self) -> Option<FrameBuffer> {
        self.return_rx.try_recv().ok().map(|frame| self.stamp(frame))
    }

    /// Wait up to `timeout` for a frame
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<FrameBuffer> {
        match self.return_rx.recv_timeout(timeout) {
            Ok(frame) => Some(self.stamp(frame)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Sending half of the return queue, handed to the pipeline tail
    pub fn recycler(&self) -> Sender<FrameBuffer> {
        self.return_tx.clone()
    }

    /// Receiving half of the return queue
    pub(crate) fn returns(&self) -> &Receiver<FrameBuffer> {
        &self.return_rx
    }

    pub(crate) fn stamp(&self, mut frame: FrameBuffer) -> FrameBuffer {
        frame.set_sequence(self.next_sequence.fetch_add(1, Ordering::Relaxed));
        frame
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self.return_rx.len();

        PoolStats {
            capacity: self.capacity,
            in_use: self.capacity.saturating_sub(available),
            available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_pool_acquire_release() {
        let pool = FramePool::new(50, 4);

        let stats = pool.stats();
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.available, 4);

        let frame1 = pool.acquire().unwrap();
        assert_eq!(frame1.len(), 150);
        assert_eq!(pool.stats().in_use, 1);

        let frame2 = pool.acquire().unwrap();
        assert_eq!(pool.stats().in_use, 2);

        let recycler = pool.recycler();
        recycler.send(frame1).unwrap();
        assert_eq!(pool.stats().in_use, 1);

        recycler.send(frame2).unwrap();
        assert_eq!(pool.stats().in_use, 0);
    }

    #[test]
    fn test_frame_pool_exhaustion() {
        let pool = FramePool::new(8, 2);

        let _f1 = pool.acquire().unwrap();
        let _f2 = pool.acquire().unwrap();

        assert!(pool.try_acquire().is_none(), "Pool should be exhausted");
        assert!(pool.acquire_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_sequence_stamped_on_acquire() {
        let pool = FramePool::new(1, 1);
        let recycler = pool.recycler();

        let first = pool.acquire().unwrap();
        assert_eq!(first.sequence(), 0);
        recycler.send(first).unwrap();

        let second = pool.acquire().unwrap();
        assert_eq!(second.sequence(), 1);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let pool = FramePool::new(4, 0);
        assert_eq!(pool.capacity(), 1);
        assert!(pool.try_acquire().is_some());
    }
}
