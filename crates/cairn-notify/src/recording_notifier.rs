use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::{Notifier, NotifyOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub options: NotifyOptions,
    pub content: String,
}

#[derive(Clone, Default)]
/// [`Notifier`] that keeps sent notifications in memory.
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, options: &NotifyOptions, content: &str) -> Result<()> {
        tracing::info!(content, "recorded notification");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                options: options.clone(),
                content: content.to_string(),
            });
        }
        Ok(())
    }
}
