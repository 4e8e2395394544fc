//! DistributionEngine - builds distribution batches and drives each
//! distribution through `pending -> approved -> paid` (or failed/cancelled).

use crate::domain::entities::caller::CallerContext;
use crate::domain::entities::distribution::{Distribution, DistributionStatus, PaymentDetails};
use crate::domain::entities::investment::InvestmentStatus;
use crate::domain::entities::performance::BusinessPerformance;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::repositories::ledger_store::{InvestmentFilter, LedgerStore};
use crate::domain::repositories::notifier::Notifier;
use crate::domain::services::allocation;
use crate::domain::services::ids;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DistributionEngine {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl DistributionEngine {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Compute (but do not persist) the batch for an approved performance
    pub async fn build_batch(
        &self,
        performance: &BusinessPerformance,
        created_by: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<Distribution>> {
        let investments = self
            .store
            .list_investments(&InvestmentFilter {
                business_id: Some(performance.business_id.clone()),
                status: Some(InvestmentStatus::Completed),
                ..Default::default()
            })
            .await?;

        let batch = allocation::allocate(performance, &investments, created_by, at, || {
            ids::new_id("dist")
        });
        debug!(
            "Allocated {} distributions for performance {} ({} completed investments, total {})",
            batch.len(),
            performance.id,
            investments.len(),
            allocation::total_completed(&investments)
        );
        Ok(batch)
    }

    pub async fn get_distribution(&self, distribution_id: &str) -> DomainResult<Distribution> {
        self.store
            .get_distribution(distribution_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Distribution", distribution_id))
    }

    async fn persist(&self, mut distribution: Distribution, from: DistributionStatus) -> DomainResult<Distribution> {
        distribution.recompute();
        self.store.update_distribution(&distribution, from).await?;
        Ok(distribution)
    }

    pub async fn approve_distribution(
        &self,
        ctx: &CallerContext,
        distribution_id: &str,
        notes: Option<String>,
    ) -> DomainResult<Distribution> {
        ctx.require_admin("approve distributions")?;
        let mut distribution = self.get_distribution(distribution_id).await?;
        let from = distribution.status;
        distribution.approve(&ctx.id, notes, Utc::now())?;
        let distribution = self.persist(distribution, from).await?;
        info!("Approved distribution {} by {}", distribution.id, ctx.id);
        Ok(distribution)
    }

    /// Record the payout, then tell the investor. A failed notification is
    /// logged and does not undo the payout.
    pub async fn mark_distribution_paid(
        &self,
        ctx: &CallerContext,
        distribution_id: &str,
        details: PaymentDetails,
    ) -> DomainResult<Distribution> {
        ctx.require_admin("pay distributions")?;
        let mut distribution = self.get_distribution(distribution_id).await?;
        let from = distribution.status;
        distribution.mark_paid(&ctx.id, details, Utc::now())?;
        let distribution = self.persist(distribution, from).await?;
        info!(
            "Paid distribution {} to investor {}: net {:.2}",
            distribution.id, distribution.investor_id, distribution.amounts.net_distribution
        );

        if let Err(e) = self
            .notifier
            .notify(&distribution.investor_id, &distribution.id)
            .await
        {
            warn!(
                "Failed to notify investor {} about distribution {}: {}",
                distribution.investor_id, distribution.id, e
            );
        }
        Ok(distribution)
    }

    pub async fn mark_distribution_failed(
        &self,
        ctx: &CallerContext,
        distribution_id: &str,
        reason: &str,
    ) -> DomainResult<Distribution> {
        ctx.require_admin("fail distributions")?;
        let mut distribution = self.get_distribution(distribution_id).await?;
        let from = distribution.status;
        distribution.mark_failed(&ctx.id, reason.to_string(), Utc::now())?;
        let distribution = self.persist(distribution, from).await?;
        warn!("Distribution {} marked failed: {}", distribution.id, reason);
        Ok(distribution)
    }

    pub async fn cancel_distribution(
        &self,
        ctx: &CallerContext,
        distribution_id: &str,
        reason: Option<String>,
    ) -> DomainResult<Distribution> {
        ctx.require_admin("cancel distributions")?;
        let mut distribution = self.get_distribution(distribution_id).await?;
        let from = distribution.status;
        distribution.cancel(&ctx.id, reason, Utc::now())?;
        let distribution = self.persist(distribution, from).await?;
        info!("Cancelled distribution {}", distribution.id);
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::business::Business;
    use crate::domain::entities::distribution::CalculationSnapshot;
    use crate::domain::entities::performance::{PerformanceBreakdown, PerformanceFigures, PerformanceStatus};
    use crate::domain::errors::ErrorKind;
    use crate::domain::repositories::ledger_store::ApprovalCommit;
    use crate::domain::value_objects::money::Money;
    use crate::domain::value_objects::period::ReportingPeriod;
    use crate::infrastructure::memory_store::InMemoryLedgerStore;
    use crate::infrastructure::notifier::RecordingNotifier;

    async fn seeded(notifier: Arc<RecordingNotifier>) -> (DistributionEngine, String) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let business =
            Business::new("biz-1".into(), "Bakery".into(), "owner-1".into(), 10_000.0).unwrap();
        store.insert_business(&business).await.unwrap();
        let now = Utc::now();
        let mut perf = BusinessPerformance::draft(
            "perf-1".into(),
            "biz-1".into(),
            ReportingPeriod::new(2025, 1).unwrap(),
            PerformanceFigures::from_amounts(50_000.0, 30_000.0).unwrap(),
            PerformanceBreakdown::default(),
            now,
        )
        .unwrap();
        perf.status = PerformanceStatus::Verified;
        store.insert_performance(&perf).await.unwrap();

        let snapshot = CalculationSnapshot::new(
            Money::new(6_000.0).unwrap(),
            Money::new(10_000.0).unwrap(),
            perf.figures.profit,
            perf.figures.loss,
        );
        let dist = Distribution::new(
            "dist-1".into(),
            "biz-1".into(),
            "perf-1".into(),
            "investor-a".into(),
            "inv-1".into(),
            snapshot,
            perf.period,
            "admin-1",
            now,
        );
        perf.approve("admin-1", now).unwrap();
        store
            .commit_approval(&ApprovalCommit {
                performance: perf,
                expected_status: PerformanceStatus::Verified,
                distributions: vec![dist],
                expected_business_version: 0,
            })
            .await
            .unwrap();

        (DistributionEngine::new(store, notifier), "dist-1".to_string())
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            method: "bank_transfer".into(),
            transaction_id: "PAY-1".into(),
        }
    }

    #[tokio::test]
    async fn test_approve_then_pay_notifies_investor() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (engine, id) = seeded(notifier.clone()).await;
        let admin = CallerContext::admin("admin-2");

        let approved = engine
            .approve_distribution(&admin, &id, Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, DistributionStatus::Approved);
        assert_eq!(approved.audit.last_modified_by, "admin-2");

        let paid = engine.mark_distribution_paid(&admin, &id, payment()).await.unwrap();
        assert_eq!(paid.status, DistributionStatus::Paid);
        assert_eq!(paid.payout.as_ref().unwrap().processed_by, "admin-2");
        assert!((paid.amounts.profit_share.value() - 12_000.0).abs() < 1e-6);
        assert_eq!(
            notifier.sent().await,
            vec![("investor-a".to_string(), id.clone())]
        );
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_payment() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let (engine, id) = seeded(notifier).await;
        let admin = CallerContext::admin("admin-1");
        engine.approve_distribution(&admin, &id, None).await.unwrap();

        let paid = engine.mark_distribution_paid(&admin, &id, payment()).await.unwrap();
        assert_eq!(paid.status, DistributionStatus::Paid);
        assert_eq!(
            engine.get_distribution(&id).await.unwrap().status,
            DistributionStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_paying_pending_is_invalid_state() {
        let (engine, id) = seeded(Arc::new(RecordingNotifier::new())).await;
        let err = engine
            .mark_distribution_paid(&CallerContext::admin("admin-1"), &id, payment())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let (engine, id) = seeded(Arc::new(RecordingNotifier::new())).await;
        let err = engine
            .approve_distribution(&CallerContext::investor("investor-a"), &id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_fail_requires_reason_and_blocks_payment() {
        let (engine, id) = seeded(Arc::new(RecordingNotifier::new())).await;
        let admin = CallerContext::admin("admin-1");

        let err = engine.mark_distribution_failed(&admin, &id, " ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let failed = engine
            .mark_distribution_failed(&admin, &id, "bank account closed")
            .await
            .unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("bank account closed"));

        let err = engine.approve_distribution(&admin, &id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_cancel_only_from_pending() {
        let (engine, id) = seeded(Arc::new(RecordingNotifier::new())).await;
        let admin = CallerContext::admin("admin-1");
        engine.approve_distribution(&admin, &id, None).await.unwrap();

        let err = engine.cancel_distribution(&admin, &id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_unknown_distribution_is_not_found() {
        let (engine, _) = seeded(Arc::new(RecordingNotifier::new())).await;
        let err = engine
            .cancel_distribution(&CallerContext::admin("admin-1"), "missing", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
