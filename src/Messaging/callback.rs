// src/Messaging/callback.rs

use super::message::Message;
use crate::Transport::NO_SUBID;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Header values of the message a callback is driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackInfo {
    pub mtype: i32,
    pub sub_id: i32,
    /// Bytes of payload in use; the bytes themselves are `msg.payload()`.
    pub len: usize,
}

impl CallbackInfo {
    fn of(msg: &Message) -> Self {
        Self {
            mtype: msg.mtype().unwrap_or_default(),
            sub_id: msg.sub_id().unwrap_or(NO_SUBID),
            len: msg.len().unwrap_or_default(),
        }
    }
}

/// Something that handles received messages.
///
/// Handlers run on listener threads and may be driven by several of them
/// at once, hence `Send + Sync`. Any closure of the right shape is one.
pub trait Handler: Send + Sync {
    fn handle(&self, msg: &mut Message, info: CallbackInfo);
}

impl<F> Handler for F
where
    F: Fn(&mut Message, CallbackInfo) + Send + Sync,
{
    fn handle(&self, msg: &mut Message, info: CallbackInfo) {
        self(msg, info)
    }
}

/// A plain function paired with the user data it is called with.
struct WithData<D> {
    fun: fn(&mut Message, CallbackInfo, &D),
    data: Arc<D>,
}

impl<D: Send + Sync> Handler for WithData<D> {
    fn handle(&self, msg: &mut Message, info: CallbackInfo) {
        (self.fun)(msg, info, &self.data)
    }
}

/// One registry entry.
pub struct Callback {
    handler: Box<dyn Handler>,
}

impl Callback {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// A function driven with a shared reference to `data` on every call.
    pub fn with_data<D>(fun: fn(&mut Message, CallbackInfo, &D), data: Arc<D>) -> Self
    where
        D: Send + Sync + 'static,
    {
        Self::new(WithData { fun, data })
    }

    /// Invoke the handler with `msg` and its header values.
    pub fn drive(&self, msg: &mut Message) {
        let info = CallbackInfo::of(msg);
        self.handler.handle(msg, info);
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Registry key: a message type, or the fallback for unmatched types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKey {
    Type(i32),
    Default,
}

impl From<i32> for MsgKey {
    fn from(mtype: i32) -> Self {
        MsgKey::Type(mtype)
    }
}

/// Message type → callback map with an optional default entry.
///
/// Only mutable during setup; listeners read it through a shared borrow.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    by_type: HashMap<i32, Callback>,
    default: Option<Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `cb` under `key`, returning the entry it replaced.
    pub fn insert(&mut self, key: MsgKey, cb: Callback) -> Option<Callback> {
        match key {
            MsgKey::Type(mtype) => self.by_type.insert(mtype, cb),
            MsgKey::Default => self.default.replace(cb),
        }
    }

    pub fn remove(&mut self, key: MsgKey) -> Option<Callback> {
        match key {
            MsgKey::Type(mtype) => self.by_type.remove(&mtype),
            MsgKey::Default => self.default.take(),
        }
    }

    /// The callback for `mtype`: the exact entry, else the default.
    pub fn lookup(&self, mtype: i32) -> Option<&Callback> {
        self.by_type.get(&mtype).or(self.default.as_ref())
    }

    pub fn contains(&self, key: MsgKey) -> bool {
        match key {
            MsgKey::Type(mtype) => self.by_type.contains_key(&mtype),
            MsgKey::Default => self.default.is_some(),
        }
    }

    /// Typed entries, not counting the default.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.default.is_none()
    }
}
