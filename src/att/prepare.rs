//! Prepare-Write Engine: per-connection two-phase commit staging (spec.md §4.3).
//!
//! A fixed-capacity slab of [`PrepareEntry`] slots, kept sorted in `(handle, offset)` order by a
//! sorted insert on every enqueue. This is the arena-with-indices shape spec.md §9 recommends in
//! place of a recursive linked list: slab exhaustion maps directly to `PrepareQueueFull` instead
//! of an allocation panic.

use super::{pdus::ErrorCode, AttError, Handle, MAX_ATTRIBUTE_VALUE_LEN};

/// One queued fragment of a prepared write, awaiting Execute Write.
pub struct PrepareEntry {
    pub handle: Handle,
    pub offset: u16,
    pub data: heapless::Vec<u8, MAX_ATTRIBUTE_VALUE_LEN>,
}

/// The per-connection queue of [`PrepareEntry`] slots.
///
/// `N` bounds how many outstanding fragments a single connection may have queued at once; once
/// full, further Prepare Write Requests are rejected with `PrepareQueueFull` (spec.md §4.3).
pub struct PrepareQueue<const N: usize> {
    entries: heapless::Vec<PrepareEntry, N>,
}

impl<const N: usize> PrepareQueue<N> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Number of fragments currently queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All queued entries, in sorted `(handle, offset)` order.
    pub fn entries(&self) -> &[PrepareEntry] {
        &self.entries
    }

    /// Discards every queued entry (Execute Write with either flag, or connection teardown).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Enqueues a new fragment, sorted-inserting it to keep the queue in `(handle, offset)`
    /// order.
    ///
    /// Returns `PrepareQueueFull` if the slab has no free slot, or
    /// `InvalidAttributeValueLength` if `fragment` itself is larger than the maximum attribute
    /// value length.
    pub fn enqueue(&mut self, handle: Handle, offset: u16, fragment: &[u8]) -> Result<(), AttError> {
        let mut data = heapless::Vec::new();
        data.extend_from_slice(fragment)
            .map_err(|()| AttError::new(ErrorCode::InvalidAttributeValueLength, handle))?;

        self.entries
            .push(PrepareEntry {
                handle,
                offset,
                data,
            })
            .map_err(|_| AttError::new(ErrorCode::PrepareQueueFull, handle))?;

        // Bubble the freshly pushed entry backward into sorted position. The queue is small
        // (bounded by N) so this is cheap and needs no extra storage.
        let mut i = self.entries.len() - 1;
        while i > 0 {
            let prev = (&self.entries[i - 1].handle, self.entries[i - 1].offset);
            let cur = (&self.entries[i].handle, self.entries[i].offset);
            if prev <= cur {
                break;
            }
            self.entries.swap(i - 1, i);
            i -= 1;
        }

        Ok(())
    }

    /// Validates the entire queue's contiguity and length invariants ahead of an Execute Write
    /// commit (spec.md §4.3 "Validation").
    ///
    /// For each contiguous same-handle run: the first entry's offset must be 0, each subsequent
    /// entry's offset must immediately follow the previous entry's accumulated length, and the
    /// run's total length must not exceed [`MAX_ATTRIBUTE_VALUE_LEN`].
    pub fn validate(&self) -> Result<(), AttError> {
        let mut i = 0;
        while i < self.entries.len() {
            let handle = self.entries[i].handle;
            let mut expected_offset: usize = 0;
            let mut total_len: usize = 0;

            while i < self.entries.len() && self.entries[i].handle == handle {
                let entry = &self.entries[i];
                if usize::from(entry.offset) != expected_offset {
                    return Err(AttError::new(ErrorCode::InvalidOffset, handle));
                }
                total_len += entry.data.len();
                if total_len > MAX_ATTRIBUTE_VALUE_LEN {
                    return Err(AttError::new(ErrorCode::InvalidAttributeValueLength, handle));
                }
                expected_offset += entry.data.len();
                i += 1;
            }
        }
        Ok(())
    }
}

impl<const N: usize> Default for PrepareQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_insert_orders_by_handle_then_offset() {
        let mut q: PrepareQueue<8> = PrepareQueue::new();
        q.enqueue(Handle::from_raw(2), 0, b"a").unwrap();
        q.enqueue(Handle::from_raw(1), 5, b"b").unwrap();
        q.enqueue(Handle::from_raw(1), 0, b"c").unwrap();

        let handles: Vec<_> = q
            .entries()
            .iter()
            .map(|e| (e.handle.as_u16(), e.offset))
            .collect();
        assert_eq!(handles, vec![(1, 0), (1, 5), (2, 0)]);
    }

    #[test]
    fn rejects_when_full() {
        let mut q: PrepareQueue<1> = PrepareQueue::new();
        q.enqueue(Handle::from_raw(1), 0, b"a").unwrap();
        assert!(q.enqueue(Handle::from_raw(1), 1, b"b").is_err());
    }

    #[test]
    fn validate_detects_gap() {
        let mut q: PrepareQueue<8> = PrepareQueue::new();
        q.enqueue(Handle::from_raw(1), 0, &[0; 10]).unwrap();
        q.enqueue(Handle::from_raw(1), 11, &[0; 10]).unwrap();
        assert!(q.validate().is_err());
    }

    #[test]
    fn validate_accepts_contiguous_run() {
        let mut q: PrepareQueue<8> = PrepareQueue::new();
        q.enqueue(Handle::from_raw(1), 0, &[0; 10]).unwrap();
        q.enqueue(Handle::from_raw(1), 10, &[0; 5]).unwrap();
        assert!(q.validate().is_ok());
    }

    #[test]
    fn clear_empties_queue() {
        let mut q: PrepareQueue<8> = PrepareQueue::new();
        q.enqueue(Handle::from_raw(1), 0, b"a").unwrap();
        q.clear();
        assert!(q.is_empty());
    }
}
