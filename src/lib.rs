//! # Depth-Camera Replay Verification Library
//!
//! This crate is the core library for the `depthcam_verify` harness. It replays
//! recorded depth-camera sessions through a driver node and asserts that the
//! published image, inertial, point-cloud, and coordinate-transform outputs
//! match golden reference values within tolerance. The driver itself, bag
//! playback, and transport plumbing are external collaborators consumed
//! through traits; everything in here is collection, gating, and comparison.
//!
//! ## Crate Structure
//!
//! - **`config`**: Harness settings loaded from TOML files (bag directory,
//!   poll quantum). See [`config::Settings`].
//! - **`collector`**: The bounded first-N [`collector::SampleCollector`] fed by
//!   the transport delivery context.
//! - **`demo`**: The built-in scenario catalog and the session scripts the
//!   playback driver satisfies it with.
//! - **`error`**: The central [`error::HarnessError`] enum and result alias.
//! - **`logging`**: `tracing` subscriber initialization driven by settings.
//! - **`messages`**: Typed sensor messages as delivered on topics — images,
//!   inertial samples, point clouds — plus the transform value type.
//! - **`orchestrator`**: The per-scenario state machine that launches the
//!   driver, gates on collection, verifies, and always tears down.
//! - **`scenario`**: Declarative scenario tables (topic themes, reference
//!   data, timeouts), loadable from TOML or built in code.
//! - **`transport`**: The `Transport` and `DriverLauncher` collaborator traits
//!   and the scripted playback driver used by tests and the demo suite.
//! - **`verify`**: Statistical verification of collected samples against
//!   kind-specific references, producing structured field checks.
//! - **`waiter`**: The multi-topic waiter that drains per-topic channels into
//!   collectors until every cap is reached or the deadline elapses.

pub mod collector;
pub mod config;
pub mod demo;
pub mod error;
pub mod logging;
pub mod messages;
pub mod orchestrator;
pub mod scenario;
pub mod transport;
pub mod verify;
pub mod waiter;
