//! Scripted playback driver.
//!
//! A simulated depth-camera driver used by the integration tests and the
//! demo suite. Each recorded session is described by a [`SessionScript`]:
//! whether the node ever becomes ready, how long startup takes, which topic
//! streams it publishes and at what cadence, and which static transforms it
//! exposes. Launching looks the script up by source name and replays it with
//! realistic timing; an unknown source produces a node that never becomes
//! ready, which is how a missing bag file presents in the field.
//!
//! The driver does not parse recordings. Frame payloads are synthesized by
//! the helpers at the bottom of this module with seeded noise, so reference
//! statistics in scenario tables are stable across runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::HarnessResult;
use crate::messages::{
    ImageEncoding, ImageMessage, ImuMessage, MessageHeader, MessageKind, PointCloudMessage,
    PointField, PointFieldType, SampleMessage, Transform,
};
use crate::transport::{DriverConfig, DriverLauncher, Transport, SUBSCRIPTION_DEPTH};

/// One static transform the driver exposes while running.
#[derive(Debug, Clone)]
pub struct StaticTransform {
    pub parent: String,
    pub child: String,
    pub transform: Transform,
}

/// One topic stream: messages published in order, one per interval.
///
/// `topic` is normally a suffix like `color/image_raw`; the launched node
/// prefixes it with `/<camera_name>` the way the driver derives its topic
/// namespace. A leading slash opts out of prefixing. `requires`/`forbids`
/// gate the stream on a launch option, which is how filter toggles such as
/// decimation change what the node publishes.
#[derive(Debug, Clone)]
pub struct StreamScript {
    pub topic: String,
    pub interval: Duration,
    pub messages: Vec<SampleMessage>,
    /// Only publish when this launch option is enabled.
    pub requires: Option<String>,
    /// Only publish when this launch option is absent or disabled.
    pub forbids: Option<String>,
}

impl StreamScript {
    pub fn new(topic: impl Into<String>, interval: Duration, messages: Vec<SampleMessage>) -> Self {
        Self {
            topic: topic.into(),
            interval,
            messages,
            requires: None,
            forbids: None,
        }
    }

    pub fn when(mut self, option: &str) -> Self {
        self.requires = Some(option.to_string());
        self
    }

    pub fn unless(mut self, option: &str) -> Self {
        self.forbids = Some(option.to_string());
        self
    }
}

/// Truthiness of a pass-through launch option.
fn option_enabled(options: &std::collections::BTreeMap<String, toml::Value>, key: &str) -> bool {
    match options.get(key) {
        None => false,
        Some(toml::Value::Boolean(b)) => *b,
        Some(toml::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(toml::Value::Integer(i)) => *i != 0,
        Some(_) => false,
    }
}

/// Everything a launched session does.
#[derive(Debug, Clone)]
pub struct SessionScript {
    /// `false` simulates a node that starts but never comes up.
    pub ready: bool,
    /// Delay between launch and readiness/publishing.
    pub startup: Duration,
    pub streams: Vec<StreamScript>,
    pub transforms: Vec<StaticTransform>,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            ready: true,
            startup: Duration::from_millis(20),
            streams: Vec::new(),
            transforms: Vec::new(),
        }
    }
}

struct Subscription {
    topic: String,
    tx: mpsc::Sender<SampleMessage>,
}

#[derive(Default)]
struct RunState {
    ready: bool,
    transforms: Vec<StaticTransform>,
}

#[derive(Default)]
struct Shared {
    subscriptions: Mutex<Vec<Subscription>>,
    state: Mutex<RunState>,
}

/// Handle for one launched session.
pub struct PlaybackHandle {
    tasks: Vec<JoinHandle<()>>,
}

/// The scripted driver: implements both collaborator traits.
#[derive(Clone)]
pub struct PlaybackDriver {
    sessions: Arc<HashMap<String, SessionScript>>,
    shared: Arc<Shared>,
}

impl PlaybackDriver {
    pub fn new(sessions: HashMap<String, SessionScript>) -> Self {
        Self {
            sessions: Arc::new(sessions),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Session scripts are keyed by bare file name; strip any directory the
    /// scenario or settings prepended.
    fn session_for(&self, source: &str) -> Option<&SessionScript> {
        let key = std::path::Path::new(source)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.to_string());
        self.sessions.get(&key)
    }
}

#[async_trait]
impl DriverLauncher for PlaybackDriver {
    type Handle = PlaybackHandle;

    async fn launch(&self, config: &DriverConfig) -> HarnessResult<Self::Handle> {
        let script = self.session_for(&config.source).cloned();
        debug!(name = %config.name, source = %config.source,
               known = script.is_some(), "launching playback session");

        let Some(script) = script else {
            // Unknown source: the node exists but never becomes ready.
            return Ok(PlaybackHandle { tasks: Vec::new() });
        };

        let delay = config.launch_delay.unwrap_or(Duration::ZERO) + script.startup;
        let mut tasks = Vec::with_capacity(1 + script.streams.len());

        let shared = Arc::clone(&self.shared);
        let becomes_ready = script.ready;
        let transforms = script.transforms.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if becomes_ready {
                let mut state = shared.state.lock();
                state.ready = true;
                state.transforms = transforms;
            }
        }));

        if script.ready {
            let camera = config
                .options
                .get("camera_name")
                .and_then(|v| v.as_str())
                .unwrap_or(&config.name)
                .to_string();
            for stream in script.streams {
                if let Some(key) = &stream.requires {
                    if !option_enabled(&config.options, key) {
                        continue;
                    }
                }
                if let Some(key) = &stream.forbids {
                    if option_enabled(&config.options, key) {
                        continue;
                    }
                }
                let topic = if stream.topic.starts_with('/') {
                    stream.topic.clone()
                } else {
                    format!("/{camera}/{}", stream.topic)
                };
                let shared = Arc::clone(&self.shared);
                tasks.push(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for message in stream.messages {
                        tokio::time::sleep(stream.interval).await;
                        let subscriptions = shared.subscriptions.lock();
                        for sub in subscriptions.iter().filter(|s| s.topic == topic) {
                            // A full or closed channel drops the frame, like
                            // any best-effort publisher.
                            let _ = sub.tx.try_send(message.clone());
                        }
                    }
                }));
            }
        }

        Ok(PlaybackHandle { tasks })
    }

    async fn wait_until_ready(&self, _handle: &Self::Handle, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.shared.state.lock().ready {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn shutdown(&self, handle: Self::Handle) {
        for task in &handle.tasks {
            task.abort();
        }
        let mut state = self.shared.state.lock();
        state.ready = false;
        state.transforms.clear();
        drop(state);
        self.shared.subscriptions.lock().clear();
    }
}

#[async_trait]
impl Transport for PlaybackDriver {
    async fn subscribe(
        &self,
        topic: &str,
        _kind: MessageKind,
    ) -> HarnessResult<mpsc::Receiver<SampleMessage>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        self.shared.subscriptions.lock().push(Subscription {
            topic: topic.to_string(),
            tx,
        });
        Ok(rx)
    }

    async fn lookup_transform(
        &self,
        parent: &str,
        child: &str,
        _tolerance: Duration,
    ) -> HarnessResult<Option<Transform>> {
        let state = self.shared.state.lock();
        if !state.ready {
            return Ok(None);
        }
        Ok(state
            .transforms
            .iter()
            .find(|t| t.parent == parent && t.child == child)
            .map(|t| t.transform.clone()))
    }
}

// ---------------------------------------------------------------------------
// Frame synthesis
// ---------------------------------------------------------------------------

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// A color frame whose channel means sit at `rgb` up to seeded noise.
pub fn color_image(
    width: u32,
    height: u32,
    rgb: [u8; 3],
    noise: u8,
    seed: u64,
) -> ImageMessage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..width * height {
        for base in rgb {
            let jitter = rng.gen_range(-i32::from(noise)..=i32::from(noise));
            data.push(clamp_u8(i32::from(base) + jitter));
        }
    }
    ImageMessage {
        header: MessageHeader::new("camera_color_optical_frame"),
        width,
        height,
        encoding: ImageEncoding::Rgb8,
        is_bigendian: false,
        step: width * 3,
        data: Bytes::from(data),
    }
}

/// A 16-bit depth raster averaging `depth` millimeters.
pub fn depth_image(width: u32, height: u32, depth: u16, noise: u16, seed: u64) -> ImageMessage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity((width * height * 2) as usize);
    for _ in 0..width * height {
        let jitter = rng.gen_range(-i32::from(noise)..=i32::from(noise));
        let value = (i32::from(depth) + jitter).clamp(0, i32::from(u16::MAX)) as u16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    ImageMessage {
        header: MessageHeader::new("camera_depth_optical_frame"),
        width,
        height,
        encoding: ImageEncoding::Mono16,
        is_bigendian: false,
        step: width * 2,
        data: Bytes::from(data),
    }
}

/// An inertial reading near the given vectors.
pub fn imu_sample(accel: [f64; 3], gyro: [f64; 3], jitter: f64, seed: u64) -> ImuMessage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut wobble = |v: f64| v + rng.gen_range(-jitter..=jitter);
    ImuMessage {
        header: MessageHeader::new("camera_accel_optical_frame"),
        linear_acceleration: nalgebra::Vector3::new(
            wobble(accel[0]),
            wobble(accel[1]),
            wobble(accel[2]),
        ),
        angular_velocity: nalgebra::Vector3::new(
            wobble(gyro[0]),
            wobble(gyro[1]),
            wobble(gyro[2]),
        ),
    }
}

/// An unorganized xyz+rgb cloud of `points` points scattered around
/// `centroid` with the given color.
pub fn xyzrgb_cloud(
    points: u32,
    centroid: [f32; 3],
    spread: f32,
    rgb: [u8; 3],
    seed: u64,
) -> PointCloudMessage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(points as usize * 16);
    for _ in 0..points {
        for c in centroid {
            let offset: f32 = rng.gen_range(-spread..=spread);
            data.extend_from_slice(&(c + offset).to_le_bytes());
        }
        let word = (u32::from(rgb[0]) << 16) | (u32::from(rgb[1]) << 8) | u32::from(rgb[2]);
        data.extend_from_slice(&word.to_le_bytes());
    }
    PointCloudMessage {
        header: MessageHeader::new("camera_depth_optical_frame"),
        height: 1,
        width: points,
        fields: vec![
            PointField::new("x", 0, PointFieldType::Float32),
            PointField::new("y", 4, PointFieldType::Float32),
            PointField::new("z", 8, PointFieldType::Float32),
            PointField::new("rgb", 12, PointFieldType::Float32),
        ],
        is_bigendian: false,
        point_step: 16,
        row_step: points * 16,
        data: Bytes::from(data),
        is_dense: true,
    }
}

/// Repeat a message into a stream burst.
pub fn burst(message: SampleMessage, count: usize) -> Vec<SampleMessage> {
    std::iter::repeat_with(|| message.clone()).take(count).collect()
}
