//! Bounded per-topic sample collection.
//!
//! A [`SampleCollector`] accumulates the first N messages delivered on one
//! topic and then goes inert: arrivals past the cap are dropped, never
//! evicting older data. Append and read share a single mutex so a reader can
//! never observe a torn sequence while the delivery context is still
//! appending.

use parking_lot::Mutex;

use crate::messages::{MessageKind, SampleMessage};

/// First-N message accumulator for one topic.
pub struct SampleCollector {
    topic: String,
    kind: MessageKind,
    cap: usize,
    samples: Mutex<Vec<SampleMessage>>,
}

impl SampleCollector {
    /// Create a collector for `topic` that fills up at `cap` messages.
    ///
    /// A cap of zero is legal and means the collector is born complete; the
    /// transform themes use this, since their verification queries the
    /// transform buffer rather than collected samples.
    pub fn new(topic: impl Into<String>, kind: MessageKind, cap: usize) -> Self {
        Self {
            topic: topic.into(),
            kind,
            cap,
            samples: Mutex::new(Vec::with_capacity(cap)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append `message` iff the cap has not been reached. Returns whether the
    /// message was kept.
    pub fn register(&self, message: SampleMessage) -> bool {
        let mut samples = self.samples.lock();
        if samples.len() < self.cap {
            samples.push(message);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_done(&self) -> bool {
        self.len() == self.cap
    }

    /// Snapshot of the accumulated ordered sequence.
    pub fn samples(&self) -> Vec<SampleMessage> {
        self.samples.lock().clone()
    }
}
