//! Notification sink for paid distributions. Delivery is fire-and-forget:
//! callers log failures and carry on.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, investor_id: &str, distribution_id: &str) -> Result<(), NotifyError>;
}
