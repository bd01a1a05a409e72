// The buffer handle passed between the framework and a transport.

use super::Structs::Buffer_Structs::{MEID_LEN, XACTION_LEN};
use super::{MsgState, NO_SUBID};
use std::fmt;

/// One transport message: header fields plus a payload region.
///
/// An `Mbuf` is move-only. Transports consume it on every send, reply,
/// reallocate or free and hand back a new one; the `id` changes each time a
/// transport issues a handle, so holders can tell the buffers apart.
pub struct Mbuf {
    id: u64,
    state: MsgState,
    mtype: i32,
    sub_id: i32,
    len: usize,
    source: u32,
    xaction: [u8; XACTION_LEN],
    meid: [u8; MEID_LEN],
    payload: Box<[u8]>,
}

impl Mbuf {
    /// A fresh handle with `capacity` zeroed payload bytes and nothing in use.
    pub fn new(id: u64, capacity: usize, source: u32) -> Self {
        Self {
            id,
            state: MsgState::Ok,
            mtype: 0,
            sub_id: NO_SUBID,
            len: 0,
            source,
            xaction: [0; XACTION_LEN],
            meid: [0; MEID_LEN],
            payload: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Copy the header of `other` into this handle (not the id or payload).
    pub fn copy_header_from(&mut self, other: &Mbuf) {
        self.state = other.state;
        self.mtype = other.mtype;
        self.sub_id = other.sub_id;
        self.source = other.source;
        self.xaction = other.xaction;
        self.meid = other.meid;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Give the handle a new identity; transports call this when reissuing.
    pub fn reissue(&mut self, id: u64) {
        self.id = id;
    }

    pub fn state(&self) -> MsgState {
        self.state
    }

    pub fn set_state(&mut self, state: MsgState) {
        self.state = state;
    }

    pub fn mtype(&self) -> i32 {
        self.mtype
    }

    pub fn set_mtype(&mut self, mtype: i32) {
        self.mtype = mtype;
    }

    pub fn sub_id(&self) -> i32 {
        self.sub_id
    }

    pub fn set_sub_id(&mut self, sub_id: i32) {
        self.sub_id = sub_id;
    }

    /// Bytes of the payload in use.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the used length; refused (returns false) beyond the capacity.
    pub fn set_len(&mut self, len: usize) -> bool {
        if len > self.payload.len() {
            return false;
        }
        self.len = len;
        true
    }

    /// Bytes available in the payload region.
    pub fn capacity(&self) -> usize {
        self.payload.len()
    }

    /// Endpoint id of the session that sent (or allocated) the message.
    pub fn source(&self) -> u32 {
        self.source
    }

    pub fn set_source(&mut self, source: u32) {
        self.source = source;
    }

    pub fn xaction(&self) -> &[u8; XACTION_LEN] {
        &self.xaction
    }

    /// Copy up to `XACTION_LEN` bytes into the transaction id; the rest is zeroed.
    pub fn set_xaction(&mut self, xaction: &[u8]) {
        let n = xaction.len().min(XACTION_LEN);
        self.xaction = [0; XACTION_LEN];
        self.xaction[..n].copy_from_slice(&xaction[..n]);
    }

    pub fn meid(&self) -> &[u8; MEID_LEN] {
        &self.meid
    }

    /// Store a managed element id. At most `MEID_LEN - 1` bytes so the
    /// field stays NUL terminated; longer ids are refused.
    pub fn set_meid(&mut self, meid: &[u8]) -> bool {
        if meid.len() >= MEID_LEN {
            return false;
        }
        self.meid = [0; MEID_LEN];
        self.meid[..meid.len()].copy_from_slice(meid);
        true
    }

    /// The whole payload region, used or not.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// Only the bytes in use.
    pub fn used(&self) -> &[u8] {
        &self.payload[..self.len]
    }
}

impl fmt::Debug for Mbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_mbuf(self, f)
    }
}
