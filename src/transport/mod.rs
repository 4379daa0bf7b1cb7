//! External collaborator seams.
//!
//! The harness never talks to a real middleware directly. It consumes two
//! small async traits: [`DriverLauncher`] for node lifecycle and
//! [`Transport`] for message delivery and transform lookup. Production
//! bindings live outside this crate; the scripted [`playback`] driver in here
//! is the test double the suite and the demo CLI run against.
//!
//! Subscriptions hand back a bounded channel rather than taking a callback:
//! the waiter drains the channels on its own schedule, which keeps collector
//! mutation on one execution context and makes the deadline logic portable.

pub mod playback;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::HarnessResult;
use crate::messages::{MessageKind, SampleMessage, Transform};

pub use playback::{PlaybackDriver, PlaybackHandle, SessionScript, StaticTransform, StreamScript};

/// Per-topic channel depth handed out by `subscribe`.
pub const SUBSCRIPTION_DEPTH: usize = 64;

/// Options the driver is launched with. The harness passes these through
/// opaquely; only the source is ever inspected (to resolve it against the
/// bag directory).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Node name the driver should come up under.
    pub name: String,
    /// Recorded session to replay.
    pub source: String,
    /// Named options: stream resolutions, enable flags, filter toggles.
    pub options: BTreeMap<String, toml::Value>,
    /// Hold back publishing for this long after launch.
    pub launch_delay: Option<Duration>,
}

/// Node lifecycle collaborator.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    type Handle: Send;

    /// Start the driver. A successful return means the process exists, not
    /// that it is ready; gate on [`DriverLauncher::wait_until_ready`].
    async fn launch(&self, config: &DriverConfig) -> HarnessResult<Self::Handle>;

    /// Block until the node reports ready or `timeout` elapses. Returns
    /// whether readiness was observed.
    async fn wait_until_ready(&self, handle: &Self::Handle, timeout: Duration) -> bool;

    /// Stop the driver and release its resources. Runs on every scenario
    /// exit path.
    async fn shutdown(&self, handle: Self::Handle);
}

/// Message delivery and transform lookup collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a bounded per-topic channel. Messages published before the
    /// subscription exists are not replayed.
    async fn subscribe(
        &self,
        topic: &str,
        kind: MessageKind,
    ) -> HarnessResult<mpsc::Receiver<SampleMessage>>;

    /// Query the transform from `parent` to `child`. `Ok(None)` means the
    /// transform is not available within `tolerance`, which is an answer,
    /// not an error.
    async fn lookup_transform(
        &self,
        parent: &str,
        child: &str,
        tolerance: Duration,
    ) -> HarnessResult<Option<Transform>>;
}
