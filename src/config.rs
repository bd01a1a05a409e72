//! Runtime settings of an xApp.

use crate::error::{Result, XappError};
use crate::Transport::Buffer::MSG_INLINE;
use std::str::FromStr;
use std::time::Duration;

/// How long a listener blocks in one receive before checking the stop flag.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(2000);

/// Settings consumed by [`XappBuilder`](crate::Xapp::XappBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XappConfig {
    /// Name used in log output and listener thread names.
    pub name: String,
    /// Listener threads started by `Xapp::run_configured`.
    pub workers: usize,
    /// Bound on a single receive inside the dispatch loop.
    pub poll_timeout: Duration,
    /// Block construction until the transport reports routes are loaded.
    pub wait_for_routes: bool,
    /// Slots in the session's receive ring (power of two).
    pub ring_capacity: usize,
    /// Bytes of shared memory for a region this xApp creates.
    pub region_size: usize,
    /// Named /dev/shm region; `None` keeps the region process local.
    pub region_name: Option<String>,
    /// Largest payload the session allocates.
    pub max_payload: usize,
    /// Log filter directive, e.g. `xapp_frame=debug`.
    pub log_filter: Option<String>,
}

impl Default for XappConfig {
    fn default() -> Self {
        Self {
            name: "xapp".to_string(),
            workers: 1,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            wait_for_routes: false,
            ring_capacity: 64,
            region_size: 64 * 1024 * 1024,
            region_name: None,
            max_payload: MSG_INLINE,
            log_filter: None,
        }
    }
}

fn parse<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| XappError::Config(format!("{key}: cannot parse {v:?}"))),
    }
}

fn parse_flag(key: &str, raw: Option<String>) -> Result<Option<bool>> {
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some("0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(v) => Err(XappError::Config(format!("{key}: expected a boolean, got {v:?}"))),
    }
}

impl XappConfig {
    /// Defaults overridden by `XAPP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment, a map in tests).
    ///
    /// Recognised keys: `XAPP_NAME`, `XAPP_WORKERS`, `XAPP_POLL_TIMEOUT_MS`,
    /// `XAPP_WAIT_FOR_ROUTES`, `XAPP_RING_CAPACITY`, `XAPP_REGION_SIZE`,
    /// `XAPP_REGION_NAME`, `XAPP_MAX_PAYLOAD`, `XAPP_LOG`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(name) = lookup("XAPP_NAME") {
            self.name = name;
        }
        if let Some(workers) = parse::<usize>("XAPP_WORKERS", lookup("XAPP_WORKERS"))? {
            self.workers = workers;
        }
        if let Some(ms) = parse::<u64>("XAPP_POLL_TIMEOUT_MS", lookup("XAPP_POLL_TIMEOUT_MS"))? {
            self.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(wait) = parse_flag("XAPP_WAIT_FOR_ROUTES", lookup("XAPP_WAIT_FOR_ROUTES"))? {
            self.wait_for_routes = wait;
        }
        if let Some(slots) = parse::<usize>("XAPP_RING_CAPACITY", lookup("XAPP_RING_CAPACITY"))? {
            self.ring_capacity = slots;
        }
        if let Some(size) = parse::<usize>("XAPP_REGION_SIZE", lookup("XAPP_REGION_SIZE"))? {
            self.region_size = size;
        }
        if let Some(region) = lookup("XAPP_REGION_NAME") {
            self.region_name = Some(region);
        }
        if let Some(max) = parse::<usize>("XAPP_MAX_PAYLOAD", lookup("XAPP_MAX_PAYLOAD"))? {
            self.max_payload = max;
        }
        if let Some(filter) = lookup(crate::logging::LOG_ENV) {
            self.log_filter = Some(filter);
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings the transport or runner cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(XappError::Config("workers must be at least 1".into()));
        }
        if self.poll_timeout.is_zero() {
            return Err(XappError::Config("poll timeout must be non-zero".into()));
        }
        if self.ring_capacity == 0 || !self.ring_capacity.is_power_of_two() {
            return Err(XappError::Config(format!(
                "ring capacity must be a power of two, got {}",
                self.ring_capacity
            )));
        }
        if self.max_payload > MSG_INLINE {
            return Err(XappError::Config(format!(
                "max payload {} exceeds the slot size {MSG_INLINE}",
                self.max_payload
            )));
        }
        Ok(())
    }
}
