use super::xapp::Xapp;
use crate::config::XappConfig;
use crate::error::{Result, XappError};
use crate::Core::alloc::SharedMemoryAllocator;
use crate::Messaging::Messenger;
use crate::Transport::{RingTransport, Transport};
use std::sync::Arc;
use std::time::Duration;

/// Configures and builds an [`Xapp`].
///
/// By default the xApp gets a [`RingTransport`] sized from the config.
/// `with_transport` plugs in any other session instead.
#[derive(Default)]
pub struct XappBuilder {
    config: XappConfig,
    transport: Option<Arc<dyn Transport>>,
    region: Option<Arc<SharedMemoryAllocator>>,
    routes: Vec<(i32, u32)>,
    routes_ready: bool,
}

impl XappBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all settings, e.g. with [`XappConfig::from_env`].
    pub fn with_config(mut self, config: XappConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Block in `build` until the transport is ready to send.
    pub fn with_wait_for_routes(mut self, wait: bool) -> Self {
        self.config.wait_for_routes = wait;
        self
    }

    pub fn with_ring_capacity(mut self, slots: usize) -> Self {
        self.config.ring_capacity = slots;
        self
    }

    pub fn with_region_size(mut self, size: usize) -> Self {
        self.config.region_size = size;
        self
    }

    pub fn with_region_name(mut self, name: impl Into<String>) -> Self {
        self.config.region_name = Some(name.into());
        self
    }

    pub fn with_max_payload(mut self, bytes: usize) -> Self {
        self.config.max_payload = bytes;
        self
    }

    /// Open the ring endpoint in a region shared with other sessions.
    pub fn with_region(mut self, region: Arc<SharedMemoryAllocator>) -> Self {
        self.region = Some(region);
        self
    }

    /// Use this session instead of opening a ring endpoint. Ring settings
    /// and routes are then ignored.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Route `mtype` to ring endpoint `endpoint`.
    pub fn with_route(mut self, mtype: i32, endpoint: u32) -> Self {
        self.routes.push((mtype, endpoint));
        self
    }

    /// Report ready even without routes (answer-only xApps).
    pub fn with_routes_ready(mut self) -> Self {
        self.routes_ready = true;
        self
    }

    pub fn config(&self) -> &XappConfig {
        &self.config
    }

    fn open_ring(&self) -> Result<RingTransport> {
        let builder = RingTransport::builder()
            .with_ring_capacity(self.config.ring_capacity)
            .with_region_size(self.config.region_size)
            .with_max_payload(self.config.max_payload);

        let ring = match (&self.region, &self.config.region_name) {
            (Some(region), _) => builder.open_on(Arc::clone(region))?,
            (None, Some(name)) => builder.with_region_name(name.as_str()).build()?,
            (None, None) => builder.build()?,
        };

        if !self.routes.is_empty() {
            ring.routes().load(self.routes.iter().copied());
        }
        if self.routes_ready {
            ring.routes().mark_ready();
        }
        Ok(ring)
    }

    pub fn build(self) -> Result<Xapp> {
        self.config.validate()?;
        if self.transport.is_some() && (!self.routes.is_empty() || self.region.is_some()) {
            return Err(XappError::InvalidArgument(
                "routes and regions apply only to the ring transport".into(),
            ));
        }

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(t) => Arc::clone(t),
            None => {
                let ring = self.open_ring()?;
                tracing::info!(name = %self.config.name, endpoint = ring.endpoint(), "ring session open");
                Arc::new(ring)
            }
        };

        let messenger = Messenger::new(transport, self.config.wait_for_routes)
            .with_poll_timeout(self.config.poll_timeout);
        Ok(Xapp::with_settings(messenger, self.config.name, self.config.workers))
    }
}
