//! Fixed-capacity ring of call timestamps.

use thiserror::Error;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Errors raised when a ring is used outside its contract.
///
/// These never occur when the ring is driven by [`RateLimiter`](super::RateLimiter)
/// and indicate a defect in the caller rather than a runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("timestamp ring is empty")]
    Empty,
    #[error("timestamp ring overflow (capacity {0})")]
    Overflow(usize),
}

/// Ring buffer holding the most recent call timestamps for one key.
///
/// Entries read from `head` for `len` slots (wrapping) are in arrival order.
/// Storage grows one slot per recorded call until it reaches the capacity and
/// is reused from then on, so memory stays bounded by the number of calls
/// seen and never exceeds the capacity.
#[derive(Debug, Clone)]
pub struct TimestampRing {
    slots: Vec<Millis>,
    capacity: usize,
    len: usize,
    /// Physical index of the oldest entry
    head: usize,
    /// Physical index of the newest entry, `None` while empty
    tail: Option<usize>,
}

impl TimestampRing {
    /// Create an empty ring with room for `capacity` timestamps.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            len: 0,
            head: 0,
            tail: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// The oldest stored timestamp.
    pub fn peek(&self) -> Result<Millis, RingError> {
        if self.is_empty() {
            return Err(RingError::Empty);
        }
        Ok(self.slots[self.head])
    }

    /// The most recently stored timestamp.
    pub fn newest(&self) -> Result<Millis, RingError> {
        self.tail.map(|i| self.slots[i]).ok_or(RingError::Empty)
    }

    /// Append `ts` as the newest entry. The ring must not be full.
    pub fn insert(&mut self, ts: Millis) -> Result<(), RingError> {
        if self.is_full() {
            return Err(RingError::Overflow(self.capacity()));
        }
        let index = match self.tail {
            Some(tail) => (tail + 1) % self.capacity(),
            None => self.head,
        };
        // Slots are written in order, so the next index is at most one past
        // the storage allocated so far.
        if index == self.slots.len() {
            self.slots.push(ts);
        } else {
            self.slots[index] = ts;
        }
        self.tail = Some(index);
        self.len += 1;
        Ok(())
    }

    /// Drop the oldest entry and append `ts` as the newest, in one step.
    pub fn replace_oldest(&mut self, ts: Millis) -> Result<(), RingError> {
        if self.is_empty() {
            return Err(RingError::Empty);
        }
        // Once full, the slot after the newest entry is the oldest one.
        // Otherwise evict by moving head forward and write behind the tail.
        if self.is_full() {
            let index = self.head;
            self.slots[index] = ts;
            self.head = (index + 1) % self.capacity();
            self.tail = Some(index);
        } else {
            self.head = (self.head + 1) % self.capacity();
            self.len -= 1;
            self.insert(ts)?;
        }
        Ok(())
    }

    /// Timestamps from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Millis> + '_ {
        (0..self.len).map(move |i| self.slots[(self.head + i) % self.capacity()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ring_is_empty() {
        let ring = TimestampRing::new(3);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.peek(), Err(RingError::Empty));
        assert_eq!(ring.newest(), Err(RingError::Empty));
    }

    #[test]
    fn test_insert_until_full() {
        let mut ring = TimestampRing::new(3);
        ring.insert(10).unwrap();
        ring.insert(20).unwrap();
        assert!(!ring.is_full());
        ring.insert(30).unwrap();

        assert!(ring.is_full());
        assert_eq!(ring.peek(), Ok(10));
        assert_eq!(ring.newest(), Ok(30));
        assert_eq!(ring.insert(40), Err(RingError::Overflow(3)));
        // A failed insert leaves the ring untouched
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    #[test]
    fn test_replace_oldest_when_full_wraps() {
        let mut ring = TimestampRing::new(3);
        for ts in [1, 2, 3] {
            ring.insert(ts).unwrap();
        }

        for ts in 4..=10 {
            ring.replace_oldest(ts).unwrap();
            assert!(ring.is_full());
            assert_eq!(ring.peek(), Ok(ts - 2));
            assert_eq!(ring.newest(), Ok(ts));
        }
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![8, 9, 10]);
    }

    #[test]
    fn test_replace_oldest_when_partially_filled() {
        let mut ring = TimestampRing::new(4);
        ring.insert(1).unwrap();
        ring.insert(2).unwrap();

        ring.replace_oldest(3).unwrap();

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_replace_oldest_on_empty_ring_fails() {
        let mut ring = TimestampRing::new(2);
        assert_eq!(ring.replace_oldest(5), Err(RingError::Empty));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_storage_grows_with_calls_not_capacity() {
        let mut ring = TimestampRing::new(u32::MAX as usize);
        assert_eq!(ring.capacity(), u32::MAX as usize);
        assert_eq!(ring.slots.capacity(), 0);

        for ts in 0..10 {
            ring.insert(ts).unwrap();
        }
        assert!(!ring.is_full());
        assert_eq!(ring.slots.len(), 10);
        assert_eq!(ring.peek(), Ok(0));
    }

    #[test]
    fn test_partial_replace_then_fill_reuses_storage() {
        let mut ring = TimestampRing::new(3);
        ring.insert(1).unwrap();
        ring.insert(2).unwrap();
        ring.replace_oldest(3).unwrap();
        ring.insert(4).unwrap();
        assert!(ring.is_full());
        ring.replace_oldest(5).unwrap();

        assert_eq!(ring.slots.len(), 3);
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_single_slot_ring() {
        let mut ring = TimestampRing::new(1);
        ring.insert(7).unwrap();
        assert!(ring.is_full());

        ring.replace_oldest(8).unwrap();
        assert_eq!(ring.peek(), Ok(8));
        assert_eq!(ring.newest(), Ok(8));
        assert_eq!(ring.len(), 1);
    }
}
