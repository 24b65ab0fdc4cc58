use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub(crate) struct NotificationEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) file: Option<String>,
    pub(crate) line: Option<u32>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
}

#[async_trait]
pub(crate) trait NotificationProvider: Send + Sync {
    async fn send(&self, event: &NotificationEvent) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Fire-and-forget fan-out. Events are dropped rather than blocking the
/// caller when the queue is full.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    pub(crate) fn new(providers: Vec<Arc<dyn NotificationProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<NotificationEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for provider in &providers {
                    if let Err(error) = provider.send(&event).await {
                        // Emitted below the notify threshold, so it cannot loop back here.
                        warn!(
                            provider = provider.provider_name(),
                            error = %error,
                            "Notification provider failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: NotificationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Notification queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Notification queue closed; dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CapturingProvider {
        messages: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl NotificationProvider for CapturingProvider {
        async fn send(&self, event: &NotificationEvent) -> Result<()> {
            self.messages.lock().unwrap().push(event.message.clone());
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "capturing"
        }
    }

    #[tokio::test]
    async fn delivers_events_to_every_provider() {
        let first = Arc::new(CapturingProvider::default());
        let second = Arc::new(CapturingProvider::default());
        let notifier = Notifier::new(vec![first.clone(), second.clone()]);

        notifier.try_notify(NotificationEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "certlist".to_string(),
            environment: "test".to_string(),
            component: "backend".to_string(),
            target: "test".to_string(),
            file: None,
            line: None,
            message: Some("boom".to_string()),
            fields: BTreeMap::new(),
        });

        for _ in 0..50 {
            if !second.messages.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(*first.messages.lock().unwrap(), vec![Some("boom".to_string())]);
        assert_eq!(*second.messages.lock().unwrap(), vec![Some("boom".to_string())]);
    }
}
