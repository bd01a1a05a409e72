use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Message type → endpoint map used by [`RingTransport`](super::RingTransport) sends.
///
/// The table may be (re)loaded while listeners are running, so it sits
/// behind a reader/writer lock. It reports ready once something has been
/// loaded into it.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<i32, u32>>,
    loaded: AtomicBool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `mtype` to `endpoint`, replacing any earlier entry.
    pub fn add(&self, mtype: i32, endpoint: u32) {
        self.routes.write().insert(mtype, endpoint);
        self.loaded.store(true, Ordering::Release);
    }

    /// Drop the route for `mtype`; returns the endpoint it pointed at.
    pub fn remove(&self, mtype: i32) -> Option<u32> {
        self.routes.write().remove(&mtype)
    }

    /// Replace the whole table in one step.
    pub fn load(&self, routes: impl IntoIterator<Item = (i32, u32)>) {
        let fresh: HashMap<i32, u32> = routes.into_iter().collect();
        *self.routes.write() = fresh;
        self.loaded.store(true, Ordering::Release);
    }

    /// Declare the table complete even if it is empty.
    pub fn mark_ready(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    pub fn lookup(&self, mtype: i32) -> Option<u32> {
        self.routes.read().get(&mtype).copied()
    }

    pub fn is_ready(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}
