use crate::Core::SharedMemory::SharedMemoryBackend;
use crate::Transport::Buffer::layout::{
    GlobalHeader, CHANNEL_CLAIMED, CHANNEL_LIVE, CHANNEL_RELEASED, MAX_CHANNELS,
};
use crate::Transport::Buffer::{RingBuffer, MSG_INLINE};
use std::io;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
mod debug;
mod getters;

const MAGIC_NUMBER: u64 = 0x5841_5050_5249_4E47; // "XAPPRING"
const LAYOUT_VERSION: u32 = 2;

fn channel_table_full() -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, "Maximum number of channels reached")
}

#[inline]
fn align128(n: usize) -> usize {
    (n + 127) & !127
}

/// A view of one channel's ring inside the region.
///
/// The view borrows memory owned by the [`SharedMemoryAllocator`]; keep the
/// allocator alive for as long as the partition is used.
pub struct ChannelPartition {
    /// The underlying ring buffer for this channel
    pub buffer: RingBuffer,
    /// The unique identifier for this channel
    pub channel_id: u32,
    /// The capacity of the channel in slots
    pub capacity: usize,
}

/// Carves a shared memory region into per-endpoint rings.
pub struct SharedMemoryAllocator {
    shm: Box<dyn SharedMemoryBackend>,
    header: *mut GlobalHeader,
    name: Option<String>,
}

impl SharedMemoryAllocator {
    /// Create a region of `size` bytes and initialise its header.
    ///
    /// `name` selects a /dev/shm backed region that other processes can
    /// [`attach`](Self::attach) to; `None` keeps the region process local.
    pub fn new(size: usize, name: Option<&str>) -> io::Result<Self> {
        let aligned_size = align128(size);
        let control_size = std::mem::size_of::<GlobalHeader>();

        // Ensure there's enough space after the header
        if aligned_size < control_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("SharedMemoryAllocator::new(): size too small to fit header. Requested: {aligned_size}, Needed: {control_size}"),
            ));
        }

        let shm = crate::Core::SharedMemory::create_shared_memory(aligned_size, name)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create shared memory:\n\
                    ├─ Aligned size: {aligned_size}\n\
                    ├─ Header size:  {control_size}\n\
                    ╰─ Error: {e}"
                    ),
                )
            })?;

        let header_ptr = shm.as_ptr().cast::<GlobalHeader>();
        if (header_ptr as usize) % 128 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            ));
        }

        // Initialize global header; the channel table starts zeroed
        unsafe {
            std::ptr::write_bytes(header_ptr, 0, 1);
            (*header_ptr).version = LAYOUT_VERSION;
            (*header_ptr).max_channels = MAX_CHANNELS as u32;
            (*header_ptr).slot_payload = MSG_INLINE as u32;
            (*header_ptr).channel_count = AtomicU32::new(0);
            (*header_ptr).next_band = AtomicU64::new(align128(control_size) as u64);
            // magic last so attaching sessions never see a half written header
            std::ptr::write_volatile(&mut (*header_ptr).magic, MAGIC_NUMBER);
        }

        Ok(Self {
            shm,
            header: header_ptr,
            name: name.map(str::to_owned),
        })
    }

    /// Attach to a named region created by another session.
    pub fn attach(name: &str, size: usize) -> io::Result<Self> {
        let aligned_size = align128(size);
        let min_required_size = std::mem::size_of::<GlobalHeader>();

        let shm = crate::Core::SharedMemory::attach_shared_memory(name, aligned_size)?;

        let header = shm.as_ptr().cast::<GlobalHeader>();
        if (header as usize) % 128 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            ));
        }

        if shm.size() < min_required_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory too small for header",
            ));
        }

        // Verify magic number and layout version
        unsafe {
            if (*header).magic != MAGIC_NUMBER {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid magic number - shared memory not properly initialized",
                ));
            }
            if (*header).version != LAYOUT_VERSION {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Region layout version {} does not match {LAYOUT_VERSION}",
                        (*header).version
                    ),
                ));
            }
        }

        Ok(Self {
            shm,
            header,
            name: Some(name.to_owned()),
        })
    }

    #[inline]
    fn header(&self) -> &GlobalHeader {
        // Safety: the header pointer is valid while the mapping lives
        unsafe { &*self.header }
    }

    /// Create a new channel with the specified capacity (in slots).
    ///
    /// A released channel of the same capacity is taken over first, keeping
    /// its id and data band; otherwise a fresh band is carved from the region.
    pub fn create_channel(&self, capacity: usize) -> io::Result<ChannelPartition> {
        // Validate capacity is a power of two and non-zero
        if capacity == 0 || (capacity & (capacity - 1)) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Capacity must be a power of two and greater than zero",
            ));
        }

        if let Some(reused) = self.reuse_channel(capacity) {
            return Ok(reused);
        }

        let channel_size = align128(capacity * RingBuffer::slot_stride());
        let header = self.header();

        if header.channel_count.load(Ordering::Acquire) as usize >= MAX_CHANNELS {
            return Err(channel_table_full());
        }

        // Claim the data band first so a full region does not burn a channel id
        let offset = loop {
            let current = header.next_band.load(Ordering::Acquire) as usize;
            if current + channel_size > self.shm.size() {
                return Err(io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!(
                        "Not enough space in shared memory: need {channel_size} bytes, {} left",
                        self.shm.size().saturating_sub(current)
                    ),
                ));
            }
            if header
                .next_band
                .compare_exchange_weak(
                    current as u64,
                    (current + channel_size) as u64,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break current;
            }
        };

        let claimed = header.channel_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            ((n as usize) < MAX_CHANNELS).then_some(n + 1)
        });
        let channel_id = match claimed {
            Ok(id) => id,
            Err(_) => {
                // lost the race for the last id; give the band back unless
                // another band was carved after it
                let _ = header.next_band.compare_exchange(
                    (offset + channel_size) as u64,
                    offset as u64,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
                return Err(channel_table_full());
            }
        };

        // The entry is ours alone until the LIVE flag is published
        unsafe {
            let entry = ptr::addr_of_mut!((*self.header).channels[channel_id as usize]);
            ptr::addr_of_mut!((*entry).channel_id).write(channel_id);
            ptr::addr_of_mut!((*entry).band_offset).write(offset as u64);
            ptr::addr_of_mut!((*entry).capacity).write(capacity as u64);
        }

        let partition = self.partition(channel_id);
        // Initialize slots (only done by creator)
        unsafe { partition.buffer.init_slots() };
        self.header().channels[channel_id as usize]
            .flags
            .store(CHANNEL_LIVE, Ordering::Release);

        Ok(partition)
    }

    /// Take over a released channel whose ring has `capacity` slots.
    fn reuse_channel(&self, capacity: usize) -> Option<ChannelPartition> {
        let header = self.header();
        for channel_id in 0..self.channel_count() {
            let entry = &header.channels[channel_id as usize];
            if entry.flags.load(Ordering::Acquire) != CHANNEL_RELEASED
                || entry.capacity != capacity as u64
            {
                continue;
            }
            if entry
                .flags
                .compare_exchange(CHANNEL_RELEASED, CHANNEL_CLAIMED, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            // The cursors stay as they are; whatever the previous owner left
            // unread is dropped so the new session starts empty.
            let partition = self.partition(channel_id);
            while partition.buffer.dequeue_with(|_, _| ()).is_some() {}
            entry.flags.store(CHANNEL_LIVE, Ordering::Release);
            return Some(partition);
        }
        None
    }

    /// View over a published channel entry.
    fn partition(&self, channel_id: u32) -> ChannelPartition {
        let channel = &self.header().channels[channel_id as usize];
        let buffer_ptr = unsafe { self.shm.as_ptr().add(channel.band_offset as usize) };
        let ring_buffer = unsafe { RingBuffer::new(channel, buffer_ptr) };

        ChannelPartition {
            buffer: ring_buffer,
            channel_id,
            capacity: channel.capacity as usize,
        }
    }

    /// Get a live channel by ID
    pub fn get_channel(&self, channel_id: u32) -> Option<ChannelPartition> {
        if channel_id as usize >= MAX_CHANNELS {
            return None;
        }

        // Acquire pairs with the creator's release of LIVE: capacity, band
        // and slot sequences are visible from here on
        let channel = &self.header().channels[channel_id as usize];
        if channel.flags.load(Ordering::Acquire) != CHANNEL_LIVE {
            return None;
        }

        Some(self.partition(channel_id))
    }

    /// Mark a live channel as released: sends to it find no endpoint, and its
    /// id and band go to the next session asking for the same capacity.
    pub fn release_channel(&self, channel_id: u32) -> io::Result<()> {
        if channel_id as usize >= MAX_CHANNELS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Channel ID out of bounds",
            ));
        }

        self.header().channels[channel_id as usize]
            .flags
            .compare_exchange(CHANNEL_LIVE, CHANNEL_RELEASED, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Channel not live"))
    }

    /// Total bytes in use: header plus every claimed data band.
    pub fn used_memory(&self) -> usize {
        self.header().next_band.load(Ordering::Acquire) as usize
    }

    /// Bytes still available for new channels.
    pub fn available_memory(&self) -> usize {
        self.shm.size().saturating_sub(self.used_memory())
    }

    /// Number of channels created in the region, live or released.
    pub fn channel_count(&self) -> u32 {
        self.header()
            .channel_count
            .load(Ordering::Acquire)
            .min(MAX_CHANNELS as u32)
    }
}

impl ChannelPartition {
    /// Get the channel ID
    pub fn id(&self) -> u32 {
        self.channel_id
    }

    /// Get a reference to the underlying ring buffer
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }
}

// Cursors and flags are atomics; entry fields are written before LIVE is published
unsafe impl Send for SharedMemoryAllocator {}
unsafe impl Sync for SharedMemoryAllocator {}
