// src/Messaging/message.rs

use crate::error::{Result, XappError};
use crate::Transport::Structs::{MEID_LEN, XACTION_LEN};
use crate::Transport::{Mbuf, MsgState, Transport};
use std::fmt;
use std::sync::Arc;

/// Which transport call a send ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// Route by message type.
    Message,
    /// Return to the endpoint the message came from.
    Response,
}

/// A single-owner wrapper around one transport buffer.
///
/// A `Message` owns at most one [`Mbuf`]. Every send or reply hands the
/// buffer to the transport and stores whatever buffer comes back, so the
/// message stays usable for a retry even after a failure. When the message
/// is dropped while still owning a buffer, the buffer is returned to the
/// transport exactly once.
///
/// `Clone` is a deep copy into a freshly allocated buffer. Use
/// [`take`](Message::take) (or a plain Rust move) to transfer ownership.
///
/// Accessors return `None` once the message no longer owns a buffer.
pub struct Message {
    mbuf: Option<Mbuf>,
    transport: Arc<dyn Transport>,
}

impl Message {
    /// Allocate a message with at least `payload_len` usable payload bytes.
    pub fn alloc(transport: &Arc<dyn Transport>, payload_len: usize) -> Result<Self> {
        let mbuf = transport
            .alloc(payload_len)
            .ok_or(XappError::TransportUnavailable)?;
        Ok(Self::wrap(mbuf, Arc::clone(transport)))
    }

    /// Take ownership of a buffer the transport handed out (e.g. on receive).
    pub(crate) fn wrap(mbuf: Mbuf, transport: Arc<dyn Transport>) -> Self {
        Self {
            mbuf: Some(mbuf),
            transport,
        }
    }

    /// Give the buffer back without freeing it; the message is left empty.
    pub(crate) fn into_mbuf(mut self) -> Option<Mbuf> {
        self.mbuf.take()
    }

    /// Whether the message still owns a buffer.
    pub fn is_valid(&self) -> bool {
        self.mbuf.is_some()
    }

    /// The owned buffer, for inspection.
    pub fn mbuf(&self) -> Option<&Mbuf> {
        self.mbuf.as_ref()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Move the buffer into a new message, leaving this one empty.
    ///
    /// Dropping the emptied message frees nothing.
    pub fn take(&mut self) -> Message {
        Message {
            mbuf: self.mbuf.take(),
            transport: Arc::clone(&self.transport),
        }
    }

    /// An independent copy of the bytes in use.
    pub fn copy_payload(&self) -> Option<Vec<u8>> {
        self.mbuf.as_ref().map(|m| m.used().to_vec())
    }

    /// The bytes in use; empty when there is no buffer.
    pub fn payload(&self) -> &[u8] {
        self.mbuf.as_ref().map(Mbuf::used).unwrap_or(&[])
    }

    /// The whole payload region, for writing in place before a send with
    /// no payload argument. The borrow ends before any send can happen.
    pub fn payload_mut(&mut self) -> Option<&mut [u8]> {
        self.mbuf.as_mut().map(Mbuf::payload_mut)
    }

    pub fn mtype(&self) -> Option<i32> {
        self.mbuf.as_ref().map(Mbuf::mtype)
    }

    pub fn sub_id(&self) -> Option<i32> {
        self.mbuf.as_ref().map(Mbuf::sub_id)
    }

    pub fn len(&self) -> Option<usize> {
        self.mbuf.as_ref().map(Mbuf::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len().unwrap_or(0) == 0
    }

    /// State left by the last transport call.
    pub fn state(&self) -> Option<MsgState> {
        self.mbuf.as_ref().map(Mbuf::state)
    }

    /// Payload bytes available without reallocating.
    pub fn available_size(&self) -> Option<usize> {
        self.mbuf.as_ref().map(Mbuf::capacity)
    }

    /// Transaction (correlation) id.
    pub fn xaction(&self) -> Option<[u8; XACTION_LEN]> {
        self.mbuf.as_ref().map(|m| *m.xaction())
    }

    /// Endpoint the message came from.
    pub fn source(&self) -> Option<u32> {
        self.mbuf.as_ref().map(Mbuf::source)
    }

    /// Managed element id, up to the first NUL.
    pub fn meid(&self) -> Option<String> {
        self.mbuf.as_ref().map(|m| {
            let raw = m.meid();
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).into_owned()
        })
    }

    fn mbuf_mut(&mut self) -> Result<&mut Mbuf> {
        self.mbuf.as_mut().ok_or(XappError::InvalidHandle)
    }

    pub fn set_mtype(&mut self, mtype: i32) -> Result<()> {
        self.mbuf_mut()?.set_mtype(mtype);
        Ok(())
    }

    pub fn set_sub_id(&mut self, sub_id: i32) -> Result<()> {
        self.mbuf_mut()?.set_sub_id(sub_id);
        Ok(())
    }

    /// Set the used length; refused beyond the available size.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        let mbuf = self.mbuf_mut()?;
        if !mbuf.set_len(len) {
            return Err(XappError::CapacityExceeded {
                requested: len,
                available: mbuf.capacity(),
            });
        }
        Ok(())
    }

    /// Set the transaction id; bytes past `XACTION_LEN` are refused.
    pub fn set_xaction(&mut self, xaction: &[u8]) -> Result<()> {
        if xaction.len() > XACTION_LEN {
            return Err(XappError::InvalidArgument(format!(
                "transaction id of {} bytes, at most {XACTION_LEN} allowed",
                xaction.len()
            )));
        }
        self.mbuf_mut()?.set_xaction(xaction);
        Ok(())
    }

    pub fn set_meid(&mut self, meid: &str) -> Result<()> {
        let mbuf = self.mbuf_mut()?;
        if !mbuf.set_meid(meid.as_bytes()) {
            return Err(XappError::InvalidArgument(format!(
                "meid of {} bytes, at most {} allowed",
                meid.len(),
                MEID_LEN - 1
            )));
        }
        Ok(())
    }

    /// Set up the buffer and hand it to the transport.
    ///
    /// `None` for `mtype`, `sub_id` or `len` leaves the current value. With
    /// a `payload` the buffer is grown (without copying) if needed and the
    /// first `len` bytes (all of them when `len` is `None`) are copied in;
    /// without one the payload is assumed to be written in place already.
    ///
    /// Once the buffer reaches the transport, the owned buffer is always
    /// replaced by the one the transport returns. A transport failure comes
    /// back as [`XappError::SendFailed`] and the message can be resent with
    /// [`raw_send`](Message::raw_send) or [`reply`](Message::reply).
    ///
    /// [`XappError::InvalidArgument`] (`len` longer than `payload`) and
    /// [`XappError::CapacityExceeded`] are raised before any hand-off, so
    /// the message keeps the buffer it had, header changes included.
    pub fn send(
        &mut self,
        kind: SendKind,
        mtype: Option<i32>,
        sub_id: Option<i32>,
        len: Option<usize>,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        let mut mbuf = self.mbuf.take().ok_or(XappError::InvalidHandle)?;

        if let Some(mtype) = mtype {
            mbuf.set_mtype(mtype);
        }
        if let Some(sub_id) = sub_id {
            mbuf.set_sub_id(sub_id);
        }

        match payload {
            Some(bytes) => {
                let n = len.unwrap_or(bytes.len());
                if n > bytes.len() {
                    self.mbuf = Some(mbuf);
                    return Err(XappError::InvalidArgument(format!(
                        "length {n} exceeds the {} payload bytes given",
                        bytes.len()
                    )));
                }
                if n > mbuf.capacity() {
                    mbuf = match self.transport.realloc_payload(mbuf, n, false) {
                        Ok(grown) => grown,
                        Err(original) => {
                            let available = original.capacity();
                            self.mbuf = Some(original);
                            return Err(XappError::CapacityExceeded { requested: n, available });
                        }
                    };
                }
                mbuf.payload_mut()[..n].copy_from_slice(&bytes[..n]);
                mbuf.set_len(n);
            }
            None => {
                if let Some(n) = len {
                    if !mbuf.set_len(n) {
                        let available = mbuf.capacity();
                        self.mbuf = Some(mbuf);
                        return Err(XappError::CapacityExceeded { requested: n, available });
                    }
                }
            }
        }

        self.hand_off(kind, mbuf)
    }

    fn hand_off(&mut self, kind: SendKind, mbuf: Mbuf) -> Result<()> {
        let returned = match kind {
            SendKind::Message => self.transport.send(mbuf),
            SendKind::Response => self.transport.return_to_sender(mbuf),
        };
        let state = returned.state();
        self.mbuf = Some(returned);

        if state.is_ok() {
            Ok(())
        } else {
            tracing::debug!(?kind, %state, "send not accepted");
            Err(XappError::SendFailed(state))
        }
    }

    /// Route a message by type.
    pub fn send_msg(
        &mut self,
        mtype: Option<i32>,
        sub_id: Option<i32>,
        len: Option<usize>,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        self.send(SendKind::Message, mtype, sub_id, len, payload)
    }

    /// Answer the sender of the message.
    pub fn send_response(
        &mut self,
        mtype: Option<i32>,
        sub_id: Option<i32>,
        len: Option<usize>,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        self.send(SendKind::Response, mtype, sub_id, len, payload)
    }

    /// Resend the buffer as it is, routed by type.
    pub fn raw_send(&mut self) -> Result<()> {
        let mbuf = self.mbuf.take().ok_or(XappError::InvalidHandle)?;
        self.hand_off(SendKind::Message, mbuf)
    }

    /// Resend the buffer as it is, back to its sender.
    pub fn reply(&mut self) -> Result<()> {
        let mbuf = self.mbuf.take().ok_or(XappError::InvalidHandle)?;
        self.hand_off(SendKind::Response, mbuf)
    }
}

impl Clone for Message {
    /// Deep copy: a new buffer holding the header and used payload.
    ///
    /// If the transport cannot allocate, the copy is an empty message.
    fn clone(&self) -> Self {
        let mbuf = self.mbuf.as_ref().and_then(|m| {
            let copy = self.transport.clone_mbuf(m, m.len());
            if copy.is_none() {
                tracing::warn!(len = m.len(), "message copy failed: no buffer from transport");
            }
            copy
        });
        Self {
            mbuf,
            transport: Arc::clone(&self.transport),
        }
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if let Some(mbuf) = self.mbuf.take() {
            self.transport.free(mbuf);
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_message(self, f)
    }
}
