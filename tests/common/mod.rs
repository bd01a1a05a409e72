// Scriptable in-memory transport shared by the integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use xapp_frame::Transport::{Mbuf, MsgState, Transport};

/// What the next receive produces.
#[derive(Debug, Clone)]
pub enum Incoming {
    Msg { mtype: i32, sub_id: i32, payload: Vec<u8> },
    State(MsgState),
}

impl Incoming {
    pub fn msg(mtype: i32) -> Self {
        Incoming::Msg {
            mtype,
            sub_id: -1,
            payload: format!("type {mtype}").into_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentVia {
    Send,
    ReturnToSender,
}

/// One buffer handed to `send` or `return_to_sender`.
#[derive(Debug, Clone)]
pub struct Sent {
    pub via: SentVia,
    pub id: u64,
    pub mtype: i32,
    pub sub_id: i32,
    pub payload: Vec<u8>,
}

pub struct MockTransport {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    pub allocs: AtomicUsize,
    pub frees: AtomicUsize,
    pub double_frees: AtomicUsize,
    pub close_calls: AtomicUsize,
    inbox: Mutex<VecDeque<Incoming>>,
    /// Keep producing this type once the inbox is empty.
    endless: Mutex<Option<i32>>,
    pub sent: Mutex<Vec<Sent>>,
    send_state: Mutex<MsgState>,
    max_payload: usize,
    fail_alloc: AtomicBool,
    fail_clone: AtomicBool,
    ready: AtomicBool,
    idle_wait: Duration,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Self::with_max_payload(64 * 1024)
    }

    pub fn with_max_payload(max_payload: usize) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            live: Mutex::new(HashSet::new()),
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            double_frees: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            inbox: Mutex::new(VecDeque::new()),
            endless: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            send_state: Mutex::new(MsgState::Ok),
            max_payload,
            fail_alloc: AtomicBool::new(false),
            fail_clone: AtomicBool::new(false),
            ready: AtomicBool::new(true),
            idle_wait: Duration::from_millis(5),
        })
    }

    pub fn push(&self, incoming: Incoming) {
        self.inbox.lock().push_back(incoming);
    }

    pub fn push_types(&self, types: &[i32]) {
        for &mtype in types {
            self.push(Incoming::msg(mtype));
        }
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.lock().len()
    }

    pub fn set_endless(&self, mtype: Option<i32>) {
        *self.endless.lock() = mtype;
    }

    /// State reported by every following send.
    pub fn set_send_state(&self, state: MsgState) {
        *self.send_state.lock() = state;
    }

    pub fn set_fail_alloc(&self, fail: bool) {
        self.fail_alloc.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_clone(&self, fail: bool) {
        self.fail_clone.store(fail, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Handles issued and not yet freed.
    pub fn live(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_live(&self, id: u64) -> bool {
        self.live.lock().contains(&id)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn issue(&self, capacity: usize) -> Mbuf {
        let id = self.fresh_id();
        self.live.lock().insert(id);
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Mbuf::new(id, capacity, 0)
    }

    fn reissue(&self, mut mbuf: Mbuf) -> Mbuf {
        let id = self.fresh_id();
        let mut live = self.live.lock();
        live.remove(&mbuf.id());
        live.insert(id);
        mbuf.reissue(id);
        mbuf
    }

    fn record(&self, via: SentVia, mbuf: Mbuf) -> Mbuf {
        self.sent.lock().push(Sent {
            via,
            id: mbuf.id(),
            mtype: mbuf.mtype(),
            sub_id: mbuf.sub_id(),
            payload: mbuf.used().to_vec(),
        });
        let mut mbuf = self.reissue(mbuf);
        mbuf.set_state(*self.send_state.lock());
        mbuf
    }

    fn fill(&self, spare: Option<Mbuf>, mtype: i32, sub_id: i32, payload: &[u8]) -> Mbuf {
        let mut mbuf = match spare {
            Some(m) if m.capacity() >= payload.len() => self.reissue(m),
            Some(m) => {
                self.free(m);
                self.issue(payload.len())
            }
            None => self.issue(payload.len().max(64)),
        };
        mbuf.set_state(MsgState::Ok);
        mbuf.set_mtype(mtype);
        mbuf.set_sub_id(sub_id);
        mbuf.payload_mut()[..payload.len()].copy_from_slice(payload);
        mbuf.set_len(payload.len());
        mbuf
    }
}

impl Transport for MockTransport {
    fn alloc(&self, payload_len: usize) -> Option<Mbuf> {
        if self.fail_alloc.load(Ordering::SeqCst) || payload_len > self.max_payload {
            return None;
        }
        Some(self.issue(payload_len))
    }

    fn send(&self, mbuf: Mbuf) -> Mbuf {
        self.record(SentVia::Send, mbuf)
    }

    fn return_to_sender(&self, mbuf: Mbuf) -> Mbuf {
        self.record(SentVia::ReturnToSender, mbuf)
    }

    fn realloc_payload(&self, mbuf: Mbuf, payload_len: usize, copy: bool) -> Result<Mbuf, Mbuf> {
        if payload_len > self.max_payload {
            return Err(mbuf);
        }
        let mut fresh = Mbuf::new(0, payload_len, mbuf.source());
        fresh.copy_header_from(&mbuf);
        if copy {
            let n = mbuf.len().min(payload_len);
            fresh.payload_mut()[..n].copy_from_slice(&mbuf.used()[..n]);
            fresh.set_len(n);
        }
        let id = self.fresh_id();
        {
            let mut live = self.live.lock();
            live.remove(&mbuf.id());
            live.insert(id);
        }
        fresh.reissue(id);
        Ok(fresh)
    }

    fn clone_mbuf(&self, mbuf: &Mbuf, payload_len: usize) -> Option<Mbuf> {
        if self.fail_clone.load(Ordering::SeqCst) {
            return None;
        }
        let mut copy = self.issue(payload_len.max(mbuf.len()));
        copy.copy_header_from(mbuf);
        copy.payload_mut()[..mbuf.len()].copy_from_slice(mbuf.used());
        copy.set_len(mbuf.len());
        Some(copy)
    }

    fn receive(&self, spare: Option<Mbuf>, timeout: Duration) -> Mbuf {
        let next = self.inbox.lock().pop_front();
        match next {
            Some(Incoming::Msg { mtype, sub_id, payload }) => self.fill(spare, mtype, sub_id, &payload),
            Some(Incoming::State(state)) => {
                let mut mbuf = spare.unwrap_or_else(|| self.issue(0));
                mbuf.set_state(state);
                self.reissue(mbuf)
            }
            None => {
                if let Some(mtype) = *self.endless.lock() {
                    return self.fill(spare, mtype, -1, b"more");
                }
                thread::sleep(timeout.min(self.idle_wait));
                let mut mbuf = spare.unwrap_or_else(|| self.issue(0));
                mbuf.set_state(MsgState::Timeout);
                self.reissue(mbuf)
            }
        }
    }

    fn free(&self, mbuf: Mbuf) {
        if self.live.lock().remove(&mbuf.id()) {
            self.frees.fetch_add(1, Ordering::SeqCst);
        } else {
            self.double_frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// The mock as the trait object the framework takes.
pub fn as_transport(mock: &Arc<MockTransport>) -> Arc<dyn Transport> {
    mock.clone()
}
