//! Multi-topic collection gating.
//!
//! The [`TopicWaiter`] owns one collector and one subscription channel per
//! topic theme and blocks the scenario until every collector reaches its cap
//! or the deadline elapses. Draining happens on the waiter's own context in a
//! poll loop with a short quantum, so there is exactly one writer per
//! collector and the deadline math stays in one place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::collector::SampleCollector;
use crate::error::HarnessResult;
use crate::messages::{MessageKind, SampleMessage};
use crate::scenario::TopicTheme;
use crate::transport::Transport;

/// Terminal outcome of a wait. The two states are mutually exclusive: either
/// every collector is at cap, or the deadline fired first.
#[derive(Debug)]
pub enum WaitOutcome {
    Complete,
    TimedOut { incomplete: Vec<IncompleteTopic> },
}

impl WaitOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, WaitOutcome::Complete)
    }
}

/// Diagnostic entry for a topic that never reached its cap.
#[derive(Debug, Clone)]
pub struct IncompleteTopic {
    pub topic: String,
    pub received: usize,
    pub expected: usize,
}

impl std::fmt::Display for IncompleteTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: received {}/{} chunks",
            self.topic, self.received, self.expected
        )
    }
}

struct WaitEntry {
    collector: Arc<SampleCollector>,
    /// `None` for transform themes, which collect nothing off the wire.
    rx: Option<mpsc::Receiver<SampleMessage>>,
}

/// Owns the collectors for one scenario and gates on their completion.
pub struct TopicWaiter {
    entries: Vec<WaitEntry>,
    quantum: Duration,
}

impl TopicWaiter {
    /// Subscribe one channel per stream theme and build the collectors.
    pub async fn subscribe<T: Transport + ?Sized>(
        transport: &T,
        themes: &[TopicTheme],
        quantum: Duration,
    ) -> HarnessResult<Self> {
        let mut entries = Vec::with_capacity(themes.len());
        for theme in themes {
            let collector = Arc::new(SampleCollector::new(
                theme.topic.clone(),
                theme.kind,
                theme.expected_chunks,
            ));
            let rx = if theme.kind == MessageKind::Transform || theme.expected_chunks == 0 {
                None
            } else {
                Some(transport.subscribe(&theme.topic, theme.kind).await?)
            };
            entries.push(WaitEntry { collector, rx });
        }
        Ok(Self { entries, quantum })
    }

    /// Block until every collector is done or `timeout` elapses.
    pub async fn wait(&mut self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain();
            if self.all_done() {
                debug!(topics = self.entries.len(), "collection complete");
                return WaitOutcome::Complete;
            }
            let now = Instant::now();
            if now >= deadline {
                let incomplete = self.incomplete();
                for entry in &incomplete {
                    warn!(topic = %entry.topic, received = entry.received,
                          expected = entry.expected, "collection timed out");
                }
                return WaitOutcome::TimedOut { incomplete };
            }
            let nap = self.quantum.min(deadline - now);
            tokio::time::sleep(nap).await;
        }
    }

    /// Move everything queued on the channels into the collectors. Messages
    /// of the wrong kind for their topic are dropped with a warning; a full
    /// collector drops the rest silently.
    fn drain(&mut self) {
        for entry in &mut self.entries {
            let Some(rx) = entry.rx.as_mut() else { continue };
            while let Ok(message) = rx.try_recv() {
                if message.kind() != entry.collector.kind() {
                    warn!(topic = %entry.collector.topic(), got = %message.kind(),
                          expected = %entry.collector.kind(), "dropping mistyped message");
                    continue;
                }
                entry.collector.register(message);
            }
        }
    }

    fn all_done(&self) -> bool {
        self.entries.iter().all(|e| e.collector.is_done())
    }

    fn incomplete(&self) -> Vec<IncompleteTopic> {
        self.entries
            .iter()
            .filter(|e| !e.collector.is_done())
            .map(|e| IncompleteTopic {
                topic: e.collector.topic().to_string(),
                received: e.collector.len(),
                expected: e.collector.cap(),
            })
            .collect()
    }

    /// Snapshot of the samples collected for `topic`.
    pub fn samples_for(&self, topic: &str) -> Option<Vec<SampleMessage>> {
        self.entries
            .iter()
            .find(|e| e.collector.topic() == topic)
            .map(|e| e.collector.samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ImuMessage, MessageHeader, Transform};
    use async_trait::async_trait;
    use nalgebra::Vector3;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Transport stub that hands the test the sender side of every
    /// subscription it gives out.
    #[derive(Default)]
    struct StubTransport {
        senders: Mutex<HashMap<String, mpsc::Sender<SampleMessage>>>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn subscribe(
            &self,
            topic: &str,
            _kind: MessageKind,
        ) -> crate::error::HarnessResult<mpsc::Receiver<SampleMessage>> {
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().insert(topic.to_string(), tx);
            Ok(rx)
        }

        async fn lookup_transform(
            &self,
            _parent: &str,
            _child: &str,
            _tolerance: Duration,
        ) -> crate::error::HarnessResult<Option<Transform>> {
            Ok(None)
        }
    }

    fn imu() -> SampleMessage {
        SampleMessage::Imu(ImuMessage {
            header: MessageHeader::new("imu_frame"),
            linear_acceleration: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        })
    }

    #[test]
    fn wait_completes_once_every_cap_is_reached() {
        tokio_test::block_on(async {
            let transport = StubTransport::default();
            let theme = TopicTheme::new("/cam/accel/sample", MessageKind::Imu).with_chunks(2);
            let mut waiter =
                TopicWaiter::subscribe(&transport, &[theme], Duration::from_millis(5))
                    .await
                    .unwrap();

            let tx = transport.senders.lock().get("/cam/accel/sample").unwrap().clone();
            tx.send(imu()).await.unwrap();
            tx.send(imu()).await.unwrap();

            let outcome = waiter.wait(Duration::from_secs(1)).await;
            assert!(outcome.is_complete());
            assert_eq!(waiter.samples_for("/cam/accel/sample").unwrap().len(), 2);
        });
    }

    #[test]
    fn silent_topic_times_out_instead_of_hanging() {
        tokio_test::block_on(async {
            let transport = StubTransport::default();
            let themes = vec![
                TopicTheme::new("/cam/accel/sample", MessageKind::Imu),
                TopicTheme::new("/cam/color/image_raw", MessageKind::Image).with_chunks(3),
            ];
            let mut waiter =
                TopicWaiter::subscribe(&transport, &themes, Duration::from_millis(5))
                    .await
                    .unwrap();

            // Satisfy the imu theme only; the image topic never publishes.
            let tx = transport.senders.lock().get("/cam/accel/sample").unwrap().clone();
            tx.send(imu()).await.unwrap();

            match waiter.wait(Duration::from_millis(100)).await {
                WaitOutcome::TimedOut { incomplete } => {
                    assert_eq!(incomplete.len(), 1);
                    assert_eq!(incomplete[0].topic, "/cam/color/image_raw");
                    assert_eq!(incomplete[0].received, 0);
                    assert_eq!(incomplete[0].expected, 3);
                }
                other => panic!("expected a timeout, got {other:?}"),
            }
        });
    }

    #[tokio::test]
    async fn mistyped_messages_do_not_count_toward_the_cap() {
        let transport = StubTransport::default();
        let theme = TopicTheme::new("/cam/color/image_raw", MessageKind::Image);
        let mut waiter = TopicWaiter::subscribe(&transport, &[theme], Duration::from_millis(5))
            .await
            .unwrap();

        let tx = transport.senders.lock().get("/cam/color/image_raw").unwrap().clone();
        tx.send(imu()).await.unwrap();

        match waiter.wait(Duration::from_millis(80)).await {
            WaitOutcome::TimedOut { incomplete } => {
                assert_eq!(incomplete[0].received, 0);
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transform_themes_need_no_subscription() {
        let transport = StubTransport::default();
        let theme = TopicTheme::new("/tf_static", MessageKind::Transform).with_chunks(0);
        let mut waiter = TopicWaiter::subscribe(&transport, &[theme], Duration::from_millis(5))
            .await
            .unwrap();

        assert!(transport.senders.lock().is_empty());
        assert!(waiter.wait(Duration::from_millis(50)).await.is_complete());
    }
}
