// src/Xapp/xapp.rs

use super::builder::XappBuilder;
use crate::error::{Result, XappError};
use crate::Messaging::{CallbackInfo, Handler, ListenerState, Message, Messenger, MsgKey, StopHandle};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// An xApp: one messenger whose dispatch loop runs on several threads.
///
/// All listeners share the messenger's transport session and its callback
/// registry. Register callbacks first, then [`run`](Xapp::run); the borrow
/// checker keeps the registry fixed while listeners are up.
pub struct Xapp {
    messenger: Messenger,
    name: String,
    workers: usize,
}

impl Xapp {
    pub fn new(messenger: Messenger) -> Self {
        Self {
            messenger,
            name: "xapp".to_string(),
            workers: 1,
        }
    }

    pub fn builder() -> XappBuilder {
        XappBuilder::new()
    }

    pub(crate) fn with_settings(messenger: Messenger, name: String, workers: usize) -> Self {
        Self {
            messenger,
            name,
            workers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Listener count used by [`run_configured`](Xapp::run_configured).
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut Messenger {
        &mut self.messenger
    }

    pub fn add_msg_cb<D>(
        &mut self,
        key: impl Into<MsgKey>,
        fun: fn(&mut Message, CallbackInfo, &D),
        data: Arc<D>,
    ) where
        D: Send + Sync + 'static,
    {
        self.messenger.add_msg_cb(key, fun, data);
    }

    pub fn add_handler(&mut self, key: impl Into<MsgKey>, handler: impl Handler + 'static) {
        self.messenger.add_handler(key, handler);
    }

    pub fn alloc_msg(&self, payload_len: usize) -> Result<Message> {
        self.messenger.alloc_msg(payload_len)
    }

    pub fn receive(&self, timeout: Duration) -> Result<Option<Message>> {
        self.messenger.receive(timeout)
    }

    pub fn wait_for_cts(&self, max_wait_secs: u64) -> bool {
        self.messenger.wait_for_cts(max_wait_secs)
    }

    /// Run `n_workers` listeners: `n_workers - 1` on new threads and one on
    /// the calling thread. Returns once every listener has stopped.
    ///
    /// Zero is treated as one. If a listener thread cannot be started the
    /// xApp is halted and the spawn error returned.
    pub fn run(&self, n_workers: usize) -> Result<()> {
        let n_workers = n_workers.max(1);
        tracing::info!(name = %self.name, workers = n_workers, "xapp starting");

        thread::scope(|scope| {
            let mut listeners = Vec::with_capacity(n_workers - 1);
            for index in 1..n_workers {
                let spawned = thread::Builder::new()
                    .name(format!("{}-{index}", self.name))
                    .spawn_scoped(scope, || self.messenger.listen());
                match spawned {
                    Ok(handle) => listeners.push(handle),
                    Err(source) => {
                        tracing::error!(index, error = %source, "listener did not start");
                        self.halt();
                        return Err(XappError::WorkerSpawn { index, source });
                    }
                }
            }

            self.messenger.listen();

            for handle in listeners {
                if handle.join().is_err() {
                    tracing::error!("listener thread panicked");
                }
            }
            Ok(())
        })?;

        tracing::info!(name = %self.name, "xapp stopped");
        Ok(())
    }

    /// [`run`](Xapp::run) with the configured worker count.
    pub fn run_configured(&self) -> Result<()> {
        self.run(self.workers)
    }

    /// Stop every listener; callable from any thread or callback.
    pub fn halt(&self) {
        self.messenger.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.messenger.stop_handle()
    }

    pub fn state(&self) -> ListenerState {
        self.messenger.state()
    }

    /// Halt on Ctrl-C / SIGTERM. Only one such handler can exist per process.
    pub fn halt_on_interrupt(&self) -> Result<()> {
        let stop = self.stop_handle();
        ctrlc::set_handler(move || {
            tracing::info!("interrupt received, halting");
            stop.stop();
        })?;
        Ok(())
    }
}

impl fmt::Debug for Xapp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_xapp(self, f)
    }
}
