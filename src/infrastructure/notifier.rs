//! Notifier adapters

use crate::domain::repositories::notifier::{Notifier, NotifyError};
use async_trait::async_trait;
use tracing::info;

#[cfg(test)]
pub use recording::RecordingNotifier;

/// Writes payout notifications to the log
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, investor_id: &str, distribution_id: &str) -> Result<(), NotifyError> {
        info!(
            investor_id,
            distribution_id, "Distribution paid, investor notified"
        );
        Ok(())
    }
}

#[cfg(test)]
mod recording {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// Keeps every notification in memory; can be switched to fail
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        failing: AtomicBool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let notifier = Self::default();
            notifier.failing.store(true, Ordering::SeqCst);
            notifier
        }

        /// (investor_id, distribution_id) pairs in delivery order
        pub async fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, investor_id: &str, distribution_id: &str) -> Result<(), NotifyError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotifyError::DeliveryFailed(format!(
                    "sink unavailable for {}",
                    investor_id
                )));
            }
            self.sent
                .lock()
                .await
                .push((investor_id.to_string(), distribution_id.to_string()));
            Ok(())
        }
    }
}
