//! Read-only aggregation over the live distribution and investment sets

use crate::domain::entities::distribution::{Distribution, DistributionStatus};
use crate::domain::entities::investment::InvestmentStatus;
use crate::domain::errors::DomainResult;
use crate::domain::repositories::ledger_store::{DistributionFilter, InvestmentFilter, LedgerStore};
use crate::domain::value_objects::money::Money;
use crate::domain::value_objects::period::ReportingPeriod;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InvestorSummary {
    pub investor_id: String,
    pub distribution_count: usize,
    pub total_profit: f64,
    pub total_loss: f64,
    pub total_net: f64,
    /// Net amount still awaiting payout (pending or approved)
    pub pending_amount: f64,
    pub paid_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessPeriodTotals {
    pub business_id: String,
    pub period: ReportingPeriod,
    pub distribution_count: usize,
    pub total_profit: f64,
    pub total_loss: f64,
    pub total_net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBucket<S> {
    pub status: S,
    pub count: usize,
    pub amount: f64,
}

pub type DistributionStats = Vec<StatusBucket<DistributionStatus>>;
pub type InvestmentStats = Vec<StatusBucket<InvestmentStatus>>;

pub struct ReportingService {
    store: Arc<dyn LedgerStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn list_investor_distributions(
        &self,
        investor_id: &str,
        status: Option<DistributionStatus>,
        period: Option<ReportingPeriod>,
    ) -> DomainResult<Vec<Distribution>> {
        let filter = DistributionFilter::for_investor(investor_id)
            .with_status(status)
            .with_period(period);
        Ok(self.store.list_distributions(&filter).await?)
    }

    pub async fn list_business_distributions(
        &self,
        business_id: &str,
        status: Option<DistributionStatus>,
        period: Option<ReportingPeriod>,
    ) -> DomainResult<Vec<Distribution>> {
        let filter = DistributionFilter::for_business(business_id)
            .with_status(status)
            .with_period(period);
        Ok(self.store.list_distributions(&filter).await?)
    }

    pub async fn investor_summary(&self, investor_id: &str) -> DomainResult<InvestorSummary> {
        let distributions = self
            .store
            .list_distributions(&DistributionFilter::for_investor(investor_id))
            .await?;

        let mut summary = InvestorSummary {
            investor_id: investor_id.to_string(),
            distribution_count: distributions.len(),
            ..Default::default()
        };
        for d in &distributions {
            summary.total_profit += d.amounts.profit_share.value();
            summary.total_loss += d.amounts.loss_share.value();
            summary.total_net += d.amounts.net_distribution;
            match d.status {
                DistributionStatus::Pending | DistributionStatus::Approved => {
                    summary.pending_amount += d.amounts.net_distribution
                }
                DistributionStatus::Paid => summary.paid_amount += d.amounts.net_distribution,
                DistributionStatus::Failed | DistributionStatus::Cancelled => {}
            }
        }
        Ok(summary)
    }

    pub async fn business_period_totals(
        &self,
        business_id: &str,
        period: ReportingPeriod,
    ) -> DomainResult<BusinessPeriodTotals> {
        let distributions = self
            .list_business_distributions(business_id, None, Some(period))
            .await?;
        Ok(BusinessPeriodTotals {
            business_id: business_id.to_string(),
            period,
            distribution_count: distributions.len(),
            total_profit: distributions.iter().map(|d| d.amounts.profit_share.value()).sum(),
            total_loss: distributions.iter().map(|d| d.amounts.loss_share.value()).sum(),
            total_net: distributions.iter().map(|d| d.amounts.net_distribution).sum(),
        })
    }

    /// Count and net amount per distribution status, every status listed
    pub async fn distribution_stats(&self) -> DomainResult<DistributionStats> {
        let distributions = self
            .store
            .list_distributions(&DistributionFilter::default())
            .await?;
        Ok(DistributionStatus::ALL
            .iter()
            .map(|&status| {
                let matching = distributions.iter().filter(|d| d.status == status);
                StatusBucket {
                    status,
                    count: matching.clone().count(),
                    amount: matching.map(|d| d.amounts.net_distribution).sum(),
                }
            })
            .collect())
    }

    /// Count and invested amount per investment status
    pub async fn investment_stats(&self, business_id: Option<&str>) -> DomainResult<InvestmentStats> {
        let investments = self
            .store
            .list_investments(&InvestmentFilter {
                business_id: business_id.map(str::to_string),
                ..Default::default()
            })
            .await?;
        Ok(InvestmentStatus::ALL
            .iter()
            .map(|&status| {
                let matching = investments.iter().filter(|i| i.status == status);
                StatusBucket {
                    status,
                    count: matching.clone().count(),
                    amount: matching.map(|i| i.amount).sum::<Money>().value(),
                }
            })
            .collect())
    }
}
