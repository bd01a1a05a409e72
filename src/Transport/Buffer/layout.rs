use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// The maximum number of endpoints (channels) a region can hold.
/// This must be a constant to allow for a fixed-size array in the GlobalHeader.
pub const MAX_CHANNELS: usize = 256;

/// `ChannelEntry::flags` while a session listens on the channel.
pub const CHANNEL_LIVE: u32 = 0x1;

/// `ChannelEntry::flags` once the owner has closed; the band may be reused by
/// a new session asking for the same capacity.
pub const CHANNEL_RELEASED: u32 = 0x2;

/// `ChannelEntry::flags` while a new owner is taking over a released band.
pub const CHANNEL_CLAIMED: u32 = 0x4;

/// Control block of one endpoint's ring within the global header.
///
/// Holds the cursors and layout information of a single ring. Keeping them in
/// the header separates the control plane from the slot data.
#[repr(C, align(128))]
pub struct ChannelEntry {
    /// Logical identifier; doubles as the endpoint id of the owning session.
    pub channel_id: u32,

    /// Zero until first published, then `CHANNEL_LIVE`, `CHANNEL_RELEASED`
    /// or `CHANNEL_CLAIMED`. Published with release ordering after the
    /// fields below and the slot sequences are written.
    pub flags: AtomicU32,

    /// The capacity of this channel's ring buffer in number of slots.
    /// Must be a power of two.
    pub capacity: u64,

    /// The byte offset from the start of the shared memory region to the
    /// beginning of this channel's data band (its ring buffer).
    pub band_offset: u64,

    /// Signal word for futex-based blocking/waking.
    /// Senders bump and wake it, listeners wait on it.
    pub signal: AtomicU32,

    /// The "tail" cursor for producers. Atomically incremented to claim a slot for writing.
    /// Padded to prevent false sharing with adjacent channel metadata.
    pub tail: CachePadded<AtomicU64>,

    /// The "head" cursor for consumers. Atomically incremented to claim a slot for reading.
    /// Padded to prevent false sharing with adjacent channel metadata.
    pub head: CachePadded<AtomicU64>,
}

/// The global header located at the very beginning of the shared memory region.
///
/// It acts as the entry point for any session, containing versioning info
/// and the table of channel entries.
#[repr(C, align(128))]
pub struct GlobalHeader {
    /// Identifies the memory region as an xapp ring region.
    pub magic: u64,

    /// The version of the memory layout.
    pub version: u32,

    /// Compiled/allocated maximum channel entries.
    pub max_channels: u32,

    /// Largest payload a slot of this region can carry.
    pub slot_payload: u32,

    /// Next channel id to hand out; shared by every attached session.
    pub channel_count: AtomicU32,

    /// Reserved/padding.
    pub reserved: u32,

    /// Byte offset where the next channel's data band starts.
    pub next_band: AtomicU64,

    /// The table of metadata for each channel.
    pub channels: [ChannelEntry; MAX_CHANNELS],
}
