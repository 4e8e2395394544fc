//! Ledger Store Trait
//!
//! `LedgerStore` is the persistence port for businesses, investments,
//! performance reports and distributions. Besides plain CRUD it exposes the
//! two multi-entity commits the pipeline needs to be atomic:
//!
//! - [`FundingCommit`]: an investment transition together with the business
//!   totals it changes, guarded by the business version.
//! - [`ApprovalCommit`]: a performance approval together with its whole
//!   distribution batch, guarded by the business version the batch was
//!   allocated against.
//!
//! Implementations either apply a commit completely or not at all.

use crate::domain::entities::business::Business;
use crate::domain::entities::distribution::{Distribution, DistributionStatus};
use crate::domain::entities::investment::{Investment, InvestmentStatus};
use crate::domain::entities::performance::{BusinessPerformance, PerformanceStatus};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::period::ReportingPeriod;
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The business changed since it was read
    #[error("Version conflict on business {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },

    /// A uniqueness rule would be broken
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// A record was not in the status the commit was prepared against
    #[error("Stale state: {0}")]
    StaleState(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::not_found(entity, &id),
            StoreError::VersionConflict { .. } | StoreError::Duplicate(_) => {
                DomainError::Conflict(e.to_string())
            }
            StoreError::StaleState(msg) => DomainError::InvalidState(msg),
            StoreError::Backend(msg) => DomainError::Internal(msg),
        }
    }
}

/// Investment transition plus the business totals it moves
#[derive(Debug, Clone)]
pub struct FundingCommit {
    pub investment: Investment,
    /// Status the stored investment must still have
    pub expected_investment_status: InvestmentStatus,
    pub business: Business,
    /// Version the business had when it was read
    pub expected_business_version: u64,
}

/// Performance approval together with its distribution batch
#[derive(Debug, Clone)]
pub struct ApprovalCommit {
    pub performance: BusinessPerformance,
    /// Status the stored performance must still have
    pub expected_status: PerformanceStatus,
    pub distributions: Vec<Distribution>,
    /// Version the business had when its completed investments were read.
    /// Any settlement or refund since then bumps it and voids the batch.
    pub expected_business_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvestmentFilter {
    pub investor_id: Option<String>,
    pub business_id: Option<String>,
    pub status: Option<InvestmentStatus>,
}

impl InvestmentFilter {
    pub fn matches(&self, investment: &Investment) -> bool {
        self.investor_id
            .as_ref()
            .map_or(true, |id| &investment.investor_id == id)
            && self
                .business_id
                .as_ref()
                .map_or(true, |id| &investment.business_id == id)
            && self.status.map_or(true, |s| investment.status == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionFilter {
    pub investor_id: Option<String>,
    pub business_id: Option<String>,
    pub performance_id: Option<String>,
    pub status: Option<DistributionStatus>,
    pub period: Option<ReportingPeriod>,
}

impl DistributionFilter {
    pub fn for_investor(investor_id: &str) -> Self {
        Self {
            investor_id: Some(investor_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_business(business_id: &str) -> Self {
        Self {
            business_id: Some(business_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_performance(performance_id: &str) -> Self {
        Self {
            performance_id: Some(performance_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Option<DistributionStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_period(mut self, period: Option<ReportingPeriod>) -> Self {
        self.period = period;
        self
    }

    pub fn matches(&self, d: &Distribution) -> bool {
        self.investor_id.as_ref().map_or(true, |id| &d.investor_id == id)
            && self.business_id.as_ref().map_or(true, |id| &d.business_id == id)
            && self
                .performance_id
                .as_ref()
                .map_or(true, |id| &d.performance_id == id)
            && self.status.map_or(true, |s| d.status == s)
            && self.period.map_or(true, |p| d.period == p)
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Businesses
    async fn insert_business(&self, business: &Business) -> StoreResult<()>;
    async fn get_business(&self, id: &str) -> StoreResult<Option<Business>>;
    /// Write a business if its stored version still equals `expected_version`
    async fn update_business(&self, business: &Business, expected_version: u64) -> StoreResult<()>;

    // Investments
    async fn insert_investment(&self, investment: &Investment) -> StoreResult<()>;
    async fn get_investment(&self, id: &str) -> StoreResult<Option<Investment>>;
    /// Write an investment if its stored status still equals `expected_status`
    async fn update_investment(
        &self,
        investment: &Investment,
        expected_status: InvestmentStatus,
    ) -> StoreResult<()>;
    async fn find_active_investment(
        &self,
        investor_id: &str,
        business_id: &str,
    ) -> StoreResult<Option<Investment>>;
    async fn list_investments(&self, filter: &InvestmentFilter) -> StoreResult<Vec<Investment>>;

    /// Apply an investment transition and its business totals atomically
    async fn commit_funding(&self, commit: &FundingCommit) -> StoreResult<()>;

    // Performance reports
    async fn insert_performance(&self, performance: &BusinessPerformance) -> StoreResult<()>;
    async fn get_performance(&self, id: &str) -> StoreResult<Option<BusinessPerformance>>;
    async fn update_performance(
        &self,
        performance: &BusinessPerformance,
        expected_status: PerformanceStatus,
    ) -> StoreResult<()>;
    async fn find_performance(
        &self,
        business_id: &str,
        period: ReportingPeriod,
    ) -> StoreResult<Option<BusinessPerformance>>;
    /// Reports of one business ordered by period
    async fn list_performances(&self, business_id: &str) -> StoreResult<Vec<BusinessPerformance>>;

    /// Approve a performance and insert its distribution batch atomically.
    /// Fails with `VersionConflict` if the business moved since allocation.
    async fn commit_approval(&self, commit: &ApprovalCommit) -> StoreResult<()>;

    // Distributions
    async fn get_distribution(&self, id: &str) -> StoreResult<Option<Distribution>>;
    async fn update_distribution(
        &self,
        distribution: &Distribution,
        expected_status: DistributionStatus,
    ) -> StoreResult<()>;
    /// Distributions matching `filter`, newest first
    async fn list_distributions(&self, filter: &DistributionFilter) -> StoreResult<Vec<Distribution>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    #[test]
    fn test_store_error_mapping() {
        let cases = [
            (
                StoreError::NotFound {
                    entity: "Business",
                    id: "b".into(),
                },
                ErrorKind::NotFound,
            ),
            (
                StoreError::VersionConflict {
                    id: "b".into(),
                    expected: 1,
                    found: 2,
                },
                ErrorKind::Conflict,
            ),
            (StoreError::Duplicate("tx".into()), ErrorKind::Conflict),
            (StoreError::StaleState("gone".into()), ErrorKind::InvalidState),
            (StoreError::Backend("io".into()), ErrorKind::Internal),
        ];
        for (store_err, kind) in cases {
            assert_eq!(DomainError::from(store_err).kind(), kind);
        }
    }

    #[test]
    fn test_investment_filter_matches() {
        use crate::domain::entities::investment::{InvestmentTerms, PaymentMethod};
        let inv = Investment::new(
            "inv-1".into(),
            "investor-a".into(),
            "biz-1".into(),
            500.0,
            PaymentMethod::Card,
            "TXN-1".into(),
            None,
            InvestmentTerms::default(),
            None,
            chrono::Utc::now(),
        )
        .unwrap();

        assert!(InvestmentFilter::default().matches(&inv));
        assert!(InvestmentFilter {
            business_id: Some("biz-1".into()),
            status: Some(InvestmentStatus::Pending),
            ..Default::default()
        }
        .matches(&inv));
        assert!(!InvestmentFilter {
            investor_id: Some("investor-b".into()),
            ..Default::default()
        }
        .matches(&inv));
    }
}
