// src/Messaging/messenger.rs

use super::callback::{Callback, CallbackInfo, CallbackRegistry, Handler, MsgKey};
use super::default_cb::{health_check, HEALTH_CHECK_REQ};
use super::message::Message;
use crate::config::DEFAULT_POLL_TIMEOUT;
use crate::error::{Result, XappError};
use crate::Transport::{Mbuf, MsgState, Transport};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Interval between readiness checks in [`Messenger::wait_for_cts`].
pub const CTS_POLL_INTERVAL: Duration = Duration::from_secs(1);

const INIT: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

/// Lifecycle of a messenger's listeners. Never goes back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Init,
    Running,
    Stopping,
    Stopped,
}

/// Stop flag plus the count of listeners still inside `listen`.
#[derive(Debug)]
struct RunState {
    state: AtomicU8,
    active: AtomicUsize,
}

impl RunState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(INIT),
            active: AtomicUsize::new(0),
        }
    }

    fn load(&self) -> ListenerState {
        match self.state.load(Ordering::Acquire) {
            INIT => ListenerState::Init,
            RUNNING => ListenerState::Running,
            STOPPING => ListenerState::Stopping,
            _ => ListenerState::Stopped,
        }
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Register a listener. False once a stop has been requested.
    fn enter(&self) -> bool {
        self.active.fetch_add(1, Ordering::AcqRel);
        match self
            .state
            .compare_exchange(INIT, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(RUNNING) => true,
            Err(_) => {
                self.leave();
                false
            }
        }
    }

    /// The last listener out completes the stop.
    fn leave(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish_stop();
        }
    }

    fn stop(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                matches!(s, INIT | RUNNING).then_some(STOPPING)
            });
        if self.active.load(Ordering::Acquire) == 0 {
            self.finish_stop();
        }
    }

    fn finish_stop(&self) {
        let _ = self
            .state
            .compare_exchange(STOPPING, STOPPED, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Stops a messenger's listeners from anywhere: another thread, a signal
/// handler, or a callback.
#[derive(Debug, Clone)]
pub struct StopHandle {
    run: Arc<RunState>,
}

impl StopHandle {
    /// Ask every listener to return at its next poll boundary.
    pub fn stop(&self) {
        self.run.stop();
    }

    pub fn state(&self) -> ListenerState {
        self.run.load()
    }
}

/// Owns the transport session and the callback registry, and runs the
/// receive → dispatch loop.
///
/// Callbacks are registered through `&mut self`; [`listen`](Messenger::listen)
/// only needs `&self`, so several threads can listen at once while the
/// registry can no longer change.
pub struct Messenger {
    transport: Arc<dyn Transport>,
    callbacks: CallbackRegistry,
    run: Arc<RunState>,
    poll_timeout: Duration,
}

impl Messenger {
    /// Take over `transport`. With `wait_for_routes` this blocks until the
    /// transport reports it is ready to send.
    ///
    /// The health check callback is pre-registered.
    pub fn new(transport: Arc<dyn Transport>, wait_for_routes: bool) -> Self {
        let mut messenger = Self {
            transport,
            callbacks: CallbackRegistry::new(),
            run: Arc::new(RunState::new()),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        };

        if wait_for_routes {
            messenger.wait_for_cts(0);
        }
        messenger.add_handler(HEALTH_CHECK_REQ, health_check);
        messenger
    }

    /// Bound on a single receive in the dispatch loop, and so on stop latency.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Register `fun` for `key`, driven with `data` on every call.
    /// Replaces an earlier registration for the same key.
    pub fn add_msg_cb<D>(
        &mut self,
        key: impl Into<MsgKey>,
        fun: fn(&mut Message, CallbackInfo, &D),
        data: Arc<D>,
    ) where
        D: Send + Sync + 'static,
    {
        self.callbacks.insert(key.into(), Callback::with_data(fun, data));
    }

    /// Register a handler (usually a closure) for `key`.
    pub fn add_handler(&mut self, key: impl Into<MsgKey>, handler: impl Handler + 'static) {
        self.callbacks.insert(key.into(), Callback::new(handler));
    }

    /// Install the callback for types with no entry of their own.
    pub fn set_default_handler(&mut self, handler: impl Handler + 'static) {
        self.add_handler(MsgKey::Default, handler);
    }

    pub fn remove_msg_cb(&mut self, key: impl Into<MsgKey>) -> bool {
        self.callbacks.remove(key.into()).is_some()
    }

    /// A message for sending, owned by the caller.
    pub fn alloc_msg(&self, payload_len: usize) -> Result<Message> {
        Message::alloc(&self.transport, payload_len)
    }

    /// Wait up to `timeout` for one message, bypassing the callbacks.
    ///
    /// `Ok(None)` on timeout.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Message>> {
        let mbuf = self.transport.receive(None, timeout);
        match mbuf.state() {
            MsgState::Ok => Ok(Some(Message::wrap(mbuf, Arc::clone(&self.transport)))),
            MsgState::Timeout => {
                self.transport.free(mbuf);
                Ok(None)
            }
            state => {
                self.transport.free(mbuf);
                Err(XappError::ReceiveError(state))
            }
        }
    }

    /// Receive and dispatch until stopped.
    ///
    /// Any number of threads may listen at once. Returns immediately if the
    /// messenger was already stopped; a stopped messenger cannot be restarted.
    pub fn listen(&self) {
        if !self.run.enter() {
            tracing::debug!("listener not started: messenger stopped");
            return;
        }
        tracing::info!(timeout_ms = self.poll_timeout.as_millis() as u64, "listener started");

        let mut spare: Option<Mbuf> = None;
        while self.run.is_running() {
            let mbuf = self.transport.receive(spare.take(), self.poll_timeout);
            spare = match mbuf.state() {
                MsgState::Ok => self.dispatch(mbuf),
                MsgState::Timeout => Some(mbuf),
                MsgState::Closed => {
                    tracing::warn!("receive on a closed session");
                    thread::sleep(self.poll_timeout);
                    Some(mbuf)
                }
                state => {
                    tracing::warn!(%state, "receive failed");
                    Some(mbuf)
                }
            };
        }

        if let Some(mbuf) = spare {
            self.transport.free(mbuf);
        }
        self.run.leave();
        tracing::info!("listener stopped");
    }

    /// Drive the callback for one received buffer. A buffer nobody wants
    /// comes back for reuse; a dispatched one is gone.
    fn dispatch(&self, mbuf: Mbuf) -> Option<Mbuf> {
        let mtype = mbuf.mtype();
        let Some(cb) = self.callbacks.lookup(mtype) else {
            tracing::debug!(mtype, "no callback for message type; dropped");
            return Some(mbuf);
        };

        tracing::trace!(mtype, len = mbuf.len(), "dispatching");
        let mut msg = Message::wrap(mbuf, Arc::clone(&self.transport));
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| cb.drive(&mut msg))) {
            tracing::error!(mtype, reason = panic_reason(panic.as_ref()), "callback panicked");
        }
        None
    }

    /// Ask every listener to return at its next poll boundary. A callback
    /// already running is allowed to finish.
    pub fn stop(&self) {
        self.run.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            run: Arc::clone(&self.run),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.run.load()
    }

    /// Wait until the transport is ready to send, checking once a second
    /// for up to `max_wait_secs` (0 waits forever). Returns whether it
    /// became ready.
    pub fn wait_for_cts(&self, max_wait_secs: u64) -> bool {
        let mut remaining = max_wait_secs;
        loop {
            if self.transport.ready() {
                return true;
            }
            if max_wait_secs != 0 {
                if remaining == 0 {
                    tracing::debug!(max_wait_secs, "transport not ready in time");
                    return false;
                }
                remaining -= 1;
            }
            thread::sleep(CTS_POLL_INTERVAL);
        }
    }
}

impl Drop for Messenger {
    fn drop(&mut self) {
        self.run.stop();
        self.transport.close();
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
