//! Fragment invalidation side channel
//!
//! Publishing happens as each TLO is processed and is not retracted if the
//! surrounding batch later rolls back. Consumers must treat events as
//! at-least-once.

use std::sync::Mutex;

pub trait FragmentPublisher: Send + Sync {
    /// Announce that cached fragments under `key` are stale.
    fn publish_fragments(&self, key: &str);
}

/// Writes each publish to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl FragmentPublisher for LogPublisher {
    fn publish_fragments(&self, key: &str) {
        log::info!("Published fragments for {}", key);
    }
}

/// Keeps every published key in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys published so far, in order.
    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

impl FragmentPublisher for RecordingPublisher {
    fn publish_fragments(&self, key: &str) {
        if let Ok(mut keys) = self.published.lock() {
            keys.push(key.to_owned());
        }
    }
}
