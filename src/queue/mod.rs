//! Fixed-capacity segment queue over caller-supplied storage.
//!
//! The queue is a ring of `Option<Segment>` slots borrowed from the
//! caller for the planner's lifetime. Capacity is fixed at creation and
//! no operation allocates; the hot path pushes at the tail and pops at
//! the head in O(1).

use crate::error::QueueError;
use crate::segment::Segment;

/// Bounded FIFO ring of motion segments.
///
/// Invariant: `len <= capacity`; segment ids are strictly increasing
/// across the queue's lifetime (the planner assigns them and never
/// reuses one, even across [`clear`](Self::clear)).
#[derive(Debug)]
pub struct SegmentQueue<'a> {
    slots: &'a mut [Option<Segment>],
    head: usize,
    len: usize,
}

impl<'a> SegmentQueue<'a> {
    /// Create a queue over the given storage.
    ///
    /// Fails with [`QueueError::NoStorage`] if the slice is empty. Any
    /// segments already present in the slice are dropped.
    pub fn new(storage: &'a mut [Option<Segment>]) -> Result<Self, QueueError> {
        if storage.is_empty() {
            return Err(QueueError::NoStorage);
        }
        for slot in storage.iter_mut() {
            *slot = None;
        }
        Ok(Self {
            slots: storage,
            head: 0,
            len: 0,
        })
    }

    /// Fixed capacity set at creation.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of queued segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no segments are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when a push would fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append a segment at the tail.
    ///
    /// Fails with [`QueueError::Full`] without mutating anything.
    pub fn push(&mut self, segment: Segment) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }
        let tail = (self.head + self.len) % self.capacity();
        self.slots[tail] = Some(segment);
        self.len += 1;
        Ok(())
    }

    /// Read-only lookahead at `offset` segments past the head.
    pub fn get(&self, offset: usize) -> Option<&Segment> {
        if offset >= self.len {
            return None;
        }
        let idx = (self.head + offset) % self.capacity();
        self.slots[idx].as_ref()
    }

    /// Mutable lookahead at `offset` segments past the head, for the
    /// executor's blend bookkeeping only.
    pub fn get_mut(&mut self, offset: usize) -> Option<&mut Segment> {
        if offset >= self.len {
            return None;
        }
        let idx = (self.head + offset) % self.capacity();
        self.slots[idx].as_mut()
    }

    /// The oldest queued segment.
    #[inline]
    pub fn front(&self) -> Option<&Segment> {
        self.get(0)
    }

    /// Mutable access to the oldest queued segment.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut Segment> {
        self.get_mut(0)
    }

    /// Remove and return the oldest segment.
    pub fn pop_front(&mut self) -> Option<Segment> {
        if self.len == 0 {
            return None;
        }
        let seg = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        seg
    }

    /// Drop every queued segment. The id counter lives in the planner
    /// and is not affected.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}
