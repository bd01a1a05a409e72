// Transport over the shared memory rings: one ring per session endpoint.

use super::routes::RouteTable;
use super::Buffer::{EnqueueError, MSG_INLINE};
use super::Structs::MessageMeta;
use super::{Mbuf, MsgState, Transport};
use crate::Core::alloc::{ChannelPartition, SharedMemoryAllocator};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Smallest payload region handed out for a received message, so handlers
/// can usually answer in place without a reallocation.
pub const RECEIVE_BUFFER: usize = 4096;

/// Configures and opens a [`RingTransport`] session.
pub struct RingTransportBuilder {
    ring_capacity: usize,
    region_size: usize,
    region_name: Option<String>,
    max_payload: usize,
}

impl Default for RingTransportBuilder {
    fn default() -> Self {
        Self {
            ring_capacity: 64,
            region_size: 64 * 1024 * 1024, // 64MB default
            region_name: None,             // process local
            max_payload: MSG_INLINE,
        }
    }
}

impl RingTransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots in this session's receive ring (power of two).
    pub fn with_ring_capacity(mut self, slots: usize) -> Self {
        self.ring_capacity = slots;
        self
    }

    pub fn with_region_size(mut self, size: usize) -> Self {
        self.region_size = size;
        self
    }

    /// Back the region by `/dev/shm/<name>` so other processes can attach.
    pub fn with_region_name(mut self, name: impl Into<String>) -> Self {
        self.region_name = Some(name.into());
        self
    }

    /// Largest payload this session will allocate; capped at one slot.
    pub fn with_max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes.min(MSG_INLINE);
        self
    }

    /// Create a new region and open the first endpoint in it.
    pub fn build(self) -> io::Result<RingTransport> {
        let region = SharedMemoryAllocator::new(self.region_size, self.region_name.as_deref())?;
        self.open_on(Arc::new(region))
    }

    /// Attach to a named region another session created and open an endpoint in it.
    pub fn attach(self, name: &str) -> io::Result<RingTransport> {
        let region = SharedMemoryAllocator::attach(name, 0)?;
        self.open_on(Arc::new(region))
    }

    /// Open an endpoint in an existing region shared with other sessions.
    pub fn open_on(self, region: Arc<SharedMemoryAllocator>) -> io::Result<RingTransport> {
        let endpoint = region.create_channel(self.ring_capacity)?;
        tracing::debug!(
            endpoint = endpoint.id(),
            slots = endpoint.capacity,
            region = ?region.region_name(),
            "opened ring endpoint"
        );

        Ok(RingTransport {
            max_payload: self.max_payload.min(region.slot_payload()),
            endpoint,
            region,
            routes: RouteTable::new(),
            next_id: AtomicU64::new(0),
            next_message_id: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

/// A session on a shared memory region.
///
/// Sends are routed by message type through the session's [`RouteTable`]
/// into the receive ring of the target endpoint; replies go to the endpoint
/// recorded as the message's source.
pub struct RingTransport {
    // declared before `region`: the view points into the region's mapping
    endpoint: ChannelPartition,
    region: Arc<SharedMemoryAllocator>,
    routes: RouteTable,
    max_payload: usize,
    next_id: AtomicU64,
    next_message_id: AtomicU64,
    outstanding: AtomicUsize,
    closed: AtomicBool,
}

impl RingTransport {
    pub fn builder() -> RingTransportBuilder {
        RingTransportBuilder::new()
    }

    /// Endpoint id of this session; other sessions route to it.
    pub fn endpoint(&self) -> u32 {
        self.endpoint.id()
    }

    pub fn region(&self) -> &Arc<SharedMemoryAllocator> {
        &self.region
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Handles issued by this session and not yet returned through `free`.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn issue(&self, capacity: usize) -> Mbuf {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        Mbuf::new(self.fresh_id(), capacity, self.endpoint())
    }

    fn reissue(&self, mut mbuf: Mbuf) -> Mbuf {
        mbuf.reissue(self.fresh_id());
        mbuf
    }

    fn stamp(&self, mut mbuf: Mbuf, state: MsgState) -> Mbuf {
        mbuf.set_state(state);
        self.reissue(mbuf)
    }

    fn deliver(&self, target: u32, mbuf: Mbuf) -> Mbuf {
        if self.is_closed() {
            return self.stamp(mbuf, MsgState::Closed);
        }

        let Some(channel) = self.region.get_channel(target) else {
            tracing::debug!(endpoint = target, mtype = mbuf.mtype(), "no live endpoint");
            return self.stamp(mbuf, MsgState::NoEndpoint);
        };

        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        let meta = MessageMeta {
            message_id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
            timestamp_ns,
            src_endpoint: self.endpoint(),
            mtype: mbuf.mtype(),
            sub_id: mbuf.sub_id(),
            sender_pid: std::process::id(),
            flags: 0,
            payload_len: mbuf.len() as u32,
            xaction: *mbuf.xaction(),
            meid: *mbuf.meid(),
        };

        match channel.buffer().enqueue(&meta, mbuf.used()) {
            Ok(_) => {
                channel.buffer().signal_consumer();
                self.stamp(mbuf, MsgState::Ok)
            }
            Err(EnqueueError::Full) => self.stamp(mbuf, MsgState::Retry),
            Err(EnqueueError::TooLarge) => self.stamp(mbuf, MsgState::Overflow),
        }
    }

    /// Fill a handle (recycling `spare` when it is big enough) from a ring slot.
    fn fill(&self, spare: Option<Mbuf>, meta: &MessageMeta, payload: &[u8]) -> Mbuf {
        let mut mbuf = match spare {
            Some(m) if m.capacity() >= payload.len() => self.reissue(m),
            Some(m) => {
                self.free(m);
                self.issue(payload.len().max(RECEIVE_BUFFER))
            }
            None => self.issue(payload.len().max(RECEIVE_BUFFER)),
        };

        mbuf.set_state(MsgState::Ok);
        mbuf.set_mtype(meta.mtype);
        mbuf.set_sub_id(meta.sub_id);
        mbuf.set_source(meta.src_endpoint);
        mbuf.set_xaction(&meta.xaction);
        // keep the id NUL terminated
        let meid_end = meta.meid.iter().position(|b| *b == 0).unwrap_or(meta.meid.len() - 1);
        mbuf.set_meid(&meta.meid[..meid_end]);
        mbuf.payload_mut()[..payload.len()].copy_from_slice(payload);
        mbuf.set_len(payload.len());
        mbuf
    }
}

impl Transport for RingTransport {
    fn alloc(&self, payload_len: usize) -> Option<Mbuf> {
        if self.is_closed() {
            tracing::debug!("allocation refused: session closed");
            return None;
        }
        if payload_len > self.max_payload {
            tracing::debug!(payload_len, max = self.max_payload, "allocation refused: too large");
            return None;
        }
        Some(self.issue(payload_len))
    }

    fn send(&self, mbuf: Mbuf) -> Mbuf {
        match self.routes.lookup(mbuf.mtype()) {
            Some(target) => self.deliver(target, mbuf),
            None => {
                tracing::debug!(mtype = mbuf.mtype(), "no route for message type");
                self.stamp(mbuf, MsgState::NoEndpoint)
            }
        }
    }

    fn return_to_sender(&self, mbuf: Mbuf) -> Mbuf {
        let target = mbuf.source();
        self.deliver(target, mbuf)
    }

    fn realloc_payload(&self, mbuf: Mbuf, payload_len: usize, copy: bool) -> Result<Mbuf, Mbuf> {
        if payload_len > self.max_payload {
            return Err(mbuf);
        }

        let mut fresh = Mbuf::new(self.fresh_id(), payload_len, mbuf.source());
        fresh.copy_header_from(&mbuf);
        if copy {
            let n = mbuf.len().min(payload_len);
            fresh.payload_mut()[..n].copy_from_slice(&mbuf.used()[..n]);
            fresh.set_len(n);
        }
        // one handle in, one out: the outstanding count is unchanged
        Ok(fresh)
    }

    fn clone_mbuf(&self, mbuf: &Mbuf, payload_len: usize) -> Option<Mbuf> {
        let capacity = payload_len.max(mbuf.len());
        if capacity > self.max_payload {
            return None;
        }

        let mut copy = self.issue(capacity);
        copy.copy_header_from(mbuf);
        copy.payload_mut()[..mbuf.len()].copy_from_slice(mbuf.used());
        copy.set_len(mbuf.len());
        Some(copy)
    }

    fn receive(&self, mut spare: Option<Mbuf>, timeout: Duration) -> Mbuf {
        let ring = self.endpoint.buffer();
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_closed() {
                let mbuf = spare.take().unwrap_or_else(|| self.issue(0));
                return self.stamp(mbuf, MsgState::Closed);
            }

            // read the signal before looking so a concurrent send cannot be missed
            let seen = ring.signal_value();
            if let Some(mbuf) = ring.dequeue_with(|meta, payload| self.fill(spare.take(), meta, payload)) {
                return mbuf;
            }

            let now = Instant::now();
            if now >= deadline {
                let mut mbuf = spare.take().unwrap_or_else(|| self.issue(0));
                mbuf.set_len(0);
                return self.stamp(mbuf, MsgState::Timeout);
            }
            ring.wait_for_data(seen, deadline - now);
        }
    }

    fn free(&self, mbuf: Mbuf) {
        // a handle this session never issued must not wrap the count
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        drop(mbuf);
    }

    fn ready(&self) -> bool {
        self.routes.is_ready()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.region.release_channel(self.endpoint()) {
            tracing::warn!(endpoint = self.endpoint(), error = %e, "failed to release endpoint");
        }
        self.endpoint.buffer().signal_all();
        tracing::info!(endpoint = self.endpoint(), "ring session closed");
    }
}

impl Drop for RingTransport {
    fn drop(&mut self) {
        self.close();
    }
}
