// Header written in front of every payload in a ring slot.

// no atomics in MessageMeta; keep as plain integral types for ABI

/// Bytes reserved for the transaction (correlation) id.
pub const XACTION_LEN: usize = 32;

/// Bytes reserved for the managed element id, NUL terminated.
pub const MEID_LEN: usize = 32;

/// Transport-only metadata that precedes each payload in a Slot.
/// ABI-stable across processes attached to the same region.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageMeta {
    pub message_id: u64,
    pub timestamp_ns: u64,
    /// Endpoint the message was sent from; replies are routed back here.
    pub src_endpoint: u32,
    pub mtype: i32,
    pub sub_id: i32,
    pub sender_pid: u32,
    pub flags: u32,
    pub payload_len: u32,
    pub xaction: [u8; XACTION_LEN],
    pub meid: [u8; MEID_LEN],
}
