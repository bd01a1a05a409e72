use crate::Core::alloc::ChannelPartition;
use crate::Core::alloc::SharedMemoryAllocator;
use crate::Messaging::message::Message;
use crate::Transport::Buffer::RingBuffer;
use crate::Transport::mbuf::Mbuf;
use crate::Xapp::xapp::Xapp;
use std::fmt;

/// Debug function for SharedMemoryAllocator
///
/// Provides a safe debug representation that shows:
/// - Header pointer location
/// - Region name (anonymous regions show `None`)
/// - Channel usage
/// - Initialization status
pub fn debug_shared_memory_allocator(
    allocator: &SharedMemoryAllocator,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("SharedMemoryAllocator")
        .field("shm", &"<opaque>")
        .field("header", &format_args!("{:p}", allocator.header_ptr()))
        .field("region", &allocator.region_name())
        .field("channels", &allocator.channel_count())
        .field("available", &allocator.available_memory())
        .field("initialized", &allocator.is_initialized())
        .finish()
}

/// Debug function for ChannelPartition
pub fn debug_channel_partition(
    partition: &ChannelPartition,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("ChannelPartition")
        .field("channel_id", &partition.channel_id)
        .field("capacity", &partition.capacity)
        .field(
            "buffer",
            &format_args!("RingBuffer(0x{:x})", partition.buffer.buffer_base as usize),
        )
        .finish()
}

/// Debug function for RingBuffer
///
/// Safely displays the buffer's memory location without dereferencing
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("buffer", &format_args!("0x{:x}", buffer.buffer_base as usize))
        .field("capacity", &buffer.capacity)
        .finish_non_exhaustive()
}

/// Debug function for Mbuf
///
/// Shows header fields only; payload bytes are summarised by length.
pub fn debug_mbuf(mbuf: &Mbuf, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Mbuf")
        .field("id", &mbuf.id())
        .field("state", &mbuf.state())
        .field("mtype", &mbuf.mtype())
        .field("sub_id", &mbuf.sub_id())
        .field("len", &mbuf.len())
        .field("capacity", &mbuf.capacity())
        .field("source", &mbuf.source())
        .finish_non_exhaustive()
}

/// Debug function for Message
pub fn debug_message(message: &Message, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match message.mbuf() {
        Some(mbuf) => f.debug_tuple("Message").field(mbuf).finish(),
        None => f.write_str("Message(<empty>)"),
    }
}

/// Debug function for Xapp: name, listener settings and registry size.
pub fn debug_xapp(xapp: &Xapp, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Xapp")
        .field("name", &xapp.name())
        .field("workers", &xapp.workers())
        .field("state", &xapp.state())
        .field("callbacks", &xapp.messenger().callbacks().len())
        .field("poll_timeout", &xapp.messenger().poll_timeout())
        .finish()
}
