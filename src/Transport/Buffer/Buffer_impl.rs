use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::time::Duration;

use super::layout::ChannelEntry;
use super::Buffer::{EnqueueError, RingBuffer, Slot, MSG_INLINE};
use crate::Core::futex::{futex_wait, futex_wake};
use crate::Transport::Structs::Buffer_Structs::MessageMeta;

impl RingBuffer {
    /// Create a ring buffer view over an existing memory region.
    ///
    /// # Safety
    /// Caller must ensure `metadata` and `buffer_base` are valid pointers to shared memory
    /// that outlive the view, and that the channel capacity is a non-zero power of two.
    pub unsafe fn new(metadata: *const ChannelEntry, buffer_base: *mut u8) -> Self {
        let capacity = (*metadata).capacity as usize;
        Self {
            metadata,
            buffer_base,
            capacity,
            mask: capacity - 1,
        }
    }

    /// Size in bytes of one slot stride in memory.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<Slot>()
    }

    /// Number of slots in the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Initialize per-slot sequence numbers to k for k in 0..capacity.
    /// This should ONLY be called by the session creating the channel.
    ///
    /// # Safety
    /// Caller guarantees the underlying memory is allocated and writable.
    pub unsafe fn init_slots(&self) {
        for k in 0..self.capacity {
            let slot = self.slot_mut(k);
            (&(*slot).sequence).store(k as u64, Relaxed);
        }
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut Slot {
        let base = self.buffer_base.add(index * Self::slot_stride());
        base.cast::<Slot>()
    }

    #[inline]
    fn entry(&self) -> &ChannelEntry {
        // Safety: the view is only built over a live channel entry
        unsafe { &*self.metadata }
    }

    /// Reserve a slot and publish one message.
    /// Returns the slot index on success.
    pub fn enqueue(&self, meta: &MessageMeta, payload: &[u8]) -> Result<usize, EnqueueError> {
        if payload.len() > MSG_INLINE {
            return Err(EnqueueError::TooLarge);
        }

        let tail_atomic = &self.entry().tail;

        loop {
            let tail = tail_atomic.load(Relaxed);
            let idx = (tail as usize) & self.mask;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - tail as i64;

            if dif == 0 {
                if tail_atomic
                    .compare_exchange_weak(tail, tail + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    // We own this slot now
                    unsafe {
                        (*slot_ptr).meta = *meta;
                        (*slot_ptr).meta.payload_len = payload.len() as u32;

                        ptr::copy_nonoverlapping(
                            payload.as_ptr(),
                            ptr::addr_of_mut!((*slot_ptr).payload).cast::<u8>(),
                            payload.len(),
                        );

                        // Publish
                        (&(*slot_ptr).sequence).store(tail + 1, Release);
                    }
                    return Ok(idx);
                }
            } else if dif < 0 {
                return Err(EnqueueError::Full);
            } else {
                // someone else is producing; backoff and retry
                std::hint::spin_loop();
            }
        }
    }

    /// Claim the next ready slot and hand its header and payload to `read`
    /// while the slot is still owned; the slot is released afterwards.
    /// Returns None if the ring appears empty.
    pub fn dequeue_with<R>(&self, read: impl FnOnce(&MessageMeta, &[u8]) -> R) -> Option<R> {
        let head_atomic = &self.entry().head;

        loop {
            let head = head_atomic.load(Relaxed);
            let idx = (head as usize) & self.mask;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - (head as i64 + 1);

            if dif == 0 {
                if head_atomic
                    .compare_exchange_weak(head, head + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let out = unsafe {
                        let meta = &(*slot_ptr).meta;
                        let len = (meta.payload_len as usize).min(MSG_INLINE);
                        read(meta, &(&(*slot_ptr).payload)[..len])
                    };

                    // free slot for future producers
                    unsafe {
                        (&(*slot_ptr).sequence).store(head + self.capacity as u64, Release);
                    }
                    return Some(out);
                }
            } else if dif < 0 {
                // empty
                return None;
            } else {
                // producer not finished; retry
                std::hint::spin_loop();
            }
        }
    }

    /// Dequeue into owned values; convenience over [`RingBuffer::dequeue_with`].
    pub fn dequeue(&self) -> Option<(MessageMeta, Vec<u8>)> {
        self.dequeue_with(|meta, payload| (*meta, payload.to_vec()))
    }

    /// Signal one waiting listener that new data is available
    pub fn signal_consumer(&self) {
        let signal = &self.entry().signal;
        signal.fetch_add(1, Release);
        futex_wake(signal, 1);
    }

    /// Wake every listener blocked on this ring (used on close).
    pub fn signal_all(&self) {
        let signal = &self.entry().signal;
        signal.fetch_add(1, Release);
        futex_wake(signal, i32::MAX);
    }

    /// Current value of the signal word; pass it to [`RingBuffer::wait_for_data`].
    pub fn signal_value(&self) -> u32 {
        self.entry().signal.load(Acquire)
    }

    /// Wait until the signal word moves past `seen`, or `timeout` passes.
    pub fn wait_for_data(&self, seen: u32, timeout: Duration) {
        futex_wait(&self.entry().signal, seen, Some(timeout));
    }
}
