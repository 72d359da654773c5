//! Subscriber doubles shared by the unit tests in this crate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use les02_types::Les02Error;

use crate::registry::{SubscriberHandle, SubscriberSink};

/// Records every message it is sent, optionally after a delay.
#[derive(Default)]
pub(crate) struct RecordingSink {
    received: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub(crate) fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriberSink for RecordingSink {
    async fn send_text(&self, text: &str) -> Result<(), Les02Error> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.received.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Behaves like a connection whose peer has gone away.
pub(crate) struct ClosedSink;

#[async_trait]
impl SubscriberSink for ClosedSink {
    async fn send_text(&self, _text: &str) -> Result<(), Les02Error> {
        Err(Les02Error::Delivery("connection closed".to_string()))
    }
}

pub(crate) fn recording() -> (Arc<RecordingSink>, SubscriberHandle) {
    let sink = Arc::new(RecordingSink::default());
    let handle = SubscriberHandle::new(sink.clone());
    (sink, handle)
}

pub(crate) fn slow(delay: Duration) -> (Arc<RecordingSink>, SubscriberHandle) {
    let sink = Arc::new(RecordingSink {
        received: Mutex::new(Vec::new()),
        delay: Some(delay),
    });
    let handle = SubscriberHandle::new(sink.clone());
    (sink, handle)
}

pub(crate) fn closed() -> SubscriberHandle {
    SubscriberHandle::new(Arc::new(ClosedSink))
}
