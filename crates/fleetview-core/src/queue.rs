//! Per-track append queues
//!
//! A sink buffer accepts one append at a time. Segments produced while a
//! buffer is busy wait in that track's FIFO and are released one by one on the
//! buffer's "ready for more" signal. Track counts are tiny (one video, one
//! audio), so tracks live in a fixed table indexed by slot rather than a map.

use crate::media::BufferId;
use bytes::Bytes;
use std::collections::VecDeque;

/// Maximum number of tracks fed into one sink
pub const MAX_TRACKS: usize = 4;

/// One track's queue and buffer state
#[derive(Debug)]
pub struct TrackAppendQueue {
    track_id: u32,
    buffer: BufferId,
    pending: VecDeque<Bytes>,
    updating: bool,
    last_seen: bool,
}

impl TrackAppendQueue {
    fn new(track_id: u32, buffer: BufferId) -> Self {
        Self {
            track_id,
            buffer,
            pending: VecDeque::new(),
            updating: false,
            last_seen: false,
        }
    }

    /// Segments waiting for the buffer
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Buffer is processing an append
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    fn is_drained(&self) -> bool {
        self.pending.is_empty() && !self.updating
    }
}

/// An append the caller must issue to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Append {
    pub buffer: BufferId,
    pub data: Bytes,
}

/// Queue table for every track of one sink
#[derive(Debug, Default)]
pub struct TrackQueues {
    slots: [Option<TrackAppendQueue>; MAX_TRACKS],
    end_signaled: bool,
}

impl TrackQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track with the buffer created for it
    ///
    /// Returns false when the table is full or the track is already known.
    pub fn insert(&mut self, track_id: u32, buffer: BufferId) -> bool {
        if self.slot(track_id).is_some() {
            return false;
        }
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(free) => {
                *free = Some(TrackAppendQueue::new(track_id, buffer));
                true
            }
            None => false,
        }
    }

    /// Number of registered tracks
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, track_id: u32) -> bool {
        self.slot(track_id).is_some()
    }

    pub fn get(&self, track_id: u32) -> Option<&TrackAppendQueue> {
        self.slot(track_id).and_then(|i| self.slots[i].as_ref())
    }

    /// Accept a produced segment
    ///
    /// Returns the append to issue now if the buffer is idle; otherwise the
    /// segment is queued. Segments for unknown tracks are dropped.
    pub fn push(&mut self, track_id: u32, data: Bytes, is_last: bool) -> Option<Append> {
        let queue = self.queue_mut(track_id)?;
        if is_last {
            queue.last_seen = true;
        }
        if queue.updating {
            queue.pending.push_back(data);
            None
        } else {
            queue.updating = true;
            Some(Append {
                buffer: queue.buffer,
                data,
            })
        }
    }

    /// Handle a buffer's "ready for more" signal
    ///
    /// Returns the next queued segment for that buffer, if any.
    pub fn complete(&mut self, buffer: BufferId) -> Option<Append> {
        let queue = self
            .slots
            .iter_mut()
            .flatten()
            .find(|q| q.buffer == buffer)?;

        match queue.pending.pop_front() {
            Some(data) => {
                queue.updating = true;
                Some(Append {
                    buffer: queue.buffer,
                    data,
                })
            }
            None => {
                queue.updating = false;
                None
            }
        }
    }

    /// Returns true exactly once: when every track has seen its last
    /// segment, every queue is empty and every buffer is idle
    pub fn take_end_of_stream(&mut self) -> bool {
        if self.end_signaled || self.is_empty() {
            return false;
        }
        let done = self
            .slots
            .iter()
            .flatten()
            .all(|q| q.last_seen && q.is_drained());
        if done {
            self.end_signaled = true;
        }
        done
    }

    /// Drop every queued segment
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.end_signaled = false;
    }

    fn slot(&self, track_id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|q| q.track_id == track_id))
    }

    fn queue_mut(&mut self, track_id: u32) -> Option<&mut TrackAppendQueue> {
        let index = self.slot(track_id)?;
        self.slots[index].as_mut()
    }
}
