//! The transport seam.
//!
//! The framework never touches the network (or the shared memory ring)
//! directly; everything goes through [`Transport`]. Every call that takes an
//! [`Mbuf`] by value consumes it and returns the handle the caller must use
//! from then on, success or not.

pub mod mbuf;
pub mod ring;
pub mod routes;

pub mod Buffer {
    #[allow(clippy::module_inception)]
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{EnqueueError, RingBuffer, Slot, MSG_INLINE}; // re-export for stable path
}

pub mod Structs {
    pub mod Buffer_Structs;
    pub use Buffer_Structs::{MessageMeta, MEID_LEN, XACTION_LEN}; // re-export for stable path
}

pub use mbuf::Mbuf;
pub use ring::{RingTransport, RingTransportBuilder};
pub use routes::RouteTable;

use std::fmt;
use std::time::Duration;

/// Sub-id carried by messages that are not tied to a subscription.
pub const NO_SUBID: i32 = -1;

/// Outcome recorded in a handle by the last transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgState {
    /// The last operation succeeded.
    Ok,
    /// A receive timed out without a message.
    Timeout,
    /// No route for the message type, or the target endpoint is gone.
    NoEndpoint,
    /// The target was busy (ring full); the same message may be resent.
    Retry,
    /// The payload does not fit what the transport can carry.
    Overflow,
    /// The handle or its arguments were unusable.
    BadArg,
    /// The session has been closed.
    Closed,
}

impl MsgState {
    pub fn is_ok(self) -> bool {
        self == MsgState::Ok
    }
}

impl fmt::Display for MsgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MsgState::Ok => "ok",
            MsgState::Timeout => "timeout",
            MsgState::NoEndpoint => "no endpoint",
            MsgState::Retry => "retry",
            MsgState::Overflow => "overflow",
            MsgState::BadArg => "bad argument",
            MsgState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A message transport session shared by every listener of one xApp.
///
/// Implementations must make concurrent `receive` calls from several
/// threads safe; the framework adds no locking of its own around them.
pub trait Transport: Send + Sync {
    /// Allocate a handle with at least `payload_len` usable bytes.
    fn alloc(&self, payload_len: usize) -> Option<Mbuf>;

    /// Route by message type. Always returns the handle to use next.
    fn send(&self, mbuf: Mbuf) -> Mbuf;

    /// Send back to the endpoint the message came from.
    fn return_to_sender(&self, mbuf: Mbuf) -> Mbuf;

    /// Replace `mbuf` with one that has at least `payload_len` usable bytes,
    /// copying the used payload when `copy` is set. On failure the original
    /// handle comes back untouched in `Err`.
    fn realloc_payload(&self, mbuf: Mbuf, payload_len: usize, copy: bool) -> Result<Mbuf, Mbuf>;

    /// Allocate an independent copy of `mbuf` (header and used payload) with
    /// at least `payload_len` usable bytes.
    fn clone_mbuf(&self, mbuf: &Mbuf, payload_len: usize) -> Option<Mbuf>;

    /// Wait up to `timeout` for one message. `spare` may be recycled for it.
    /// The returned handle's state tells success, timeout or failure.
    fn receive(&self, spare: Option<Mbuf>, timeout: Duration) -> Mbuf;

    /// Return a handle to the transport.
    fn free(&self, mbuf: Mbuf);

    /// Whether the transport has enough routing information to send.
    fn ready(&self) -> bool;

    /// Close the session; blocked receivers return promptly afterwards.
    fn close(&self);
}
