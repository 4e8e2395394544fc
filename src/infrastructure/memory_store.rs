//! In-memory `LedgerStore`
//!
//! All state sits behind one async mutex, so every commit observes and
//! mutates a consistent snapshot. Commits validate everything first and only
//! then write, which makes them all-or-nothing.

use crate::domain::entities::business::Business;
use crate::domain::entities::distribution::{Distribution, DistributionStatus};
use crate::domain::entities::investment::{Investment, InvestmentStatus};
use crate::domain::entities::performance::{BusinessPerformance, PerformanceStatus};
use crate::domain::repositories::ledger_store::*;
use crate::domain::value_objects::period::ReportingPeriod;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct LedgerState {
    businesses: HashMap<String, Business>,
    investments: HashMap<String, Investment>,
    performances: HashMap<String, BusinessPerformance>,
    distributions: HashMap<String, Distribution>,
}

impl LedgerState {
    fn check_business_version(&self, id: &str, expected: u64) -> StoreResult<()> {
        let stored = self.businesses.get(id).ok_or_else(|| StoreError::NotFound {
            entity: "Business",
            id: id.to_string(),
        })?;
        if stored.version != expected {
            return Err(StoreError::VersionConflict {
                id: id.to_string(),
                expected,
                found: stored.version,
            });
        }
        Ok(())
    }

    fn write_business(&mut self, business: &Business, expected: u64) {
        let mut next = business.clone();
        next.version = expected + 1;
        self.businesses.insert(next.id.clone(), next);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_business(&self, business: &Business) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.businesses.contains_key(&business.id) {
            return Err(StoreError::Duplicate(format!("business id {}", business.id)));
        }
        state.businesses.insert(business.id.clone(), business.clone());
        Ok(())
    }

    async fn get_business(&self, id: &str) -> StoreResult<Option<Business>> {
        Ok(self.state.lock().await.businesses.get(id).cloned())
    }

    async fn update_business(&self, business: &Business, expected_version: u64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check_business_version(&business.id, expected_version)?;
        state.write_business(business, expected_version);
        Ok(())
    }

    async fn insert_investment(&self, investment: &Investment) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.investments.contains_key(&investment.id) {
            return Err(StoreError::Duplicate(format!("investment id {}", investment.id)));
        }
        for existing in state.investments.values() {
            if existing.payment.transaction_id == investment.payment.transaction_id {
                return Err(StoreError::Duplicate(format!(
                    "transaction id {}",
                    investment.payment.transaction_id
                )));
            }
            if investment.status.is_active()
                && existing.status.is_active()
                && existing.investor_id == investment.investor_id
                && existing.business_id == investment.business_id
            {
                return Err(StoreError::Duplicate(format!(
                    "active investment by {} in business {}",
                    investment.investor_id, investment.business_id
                )));
            }
        }
        state
            .investments
            .insert(investment.id.clone(), investment.clone());
        Ok(())
    }

    async fn get_investment(&self, id: &str) -> StoreResult<Option<Investment>> {
        Ok(self.state.lock().await.investments.get(id).cloned())
    }

    async fn update_investment(
        &self,
        investment: &Investment,
        expected_status: InvestmentStatus,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .investments
            .get_mut(&investment.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Investment",
                id: investment.id.clone(),
            })?;
        if slot.status != expected_status {
            return Err(StoreError::StaleState(format!(
                "investment {} is {}, expected {}",
                investment.id, slot.status, expected_status
            )));
        }
        *slot = investment.clone();
        Ok(())
    }

    async fn find_active_investment(
        &self,
        investor_id: &str,
        business_id: &str,
    ) -> StoreResult<Option<Investment>> {
        let state = self.state.lock().await;
        Ok(state
            .investments
            .values()
            .find(|i| {
                i.investor_id == investor_id && i.business_id == business_id && i.status.is_active()
            })
            .cloned())
    }

    async fn list_investments(&self, filter: &InvestmentFilter) -> StoreResult<Vec<Investment>> {
        let state = self.state.lock().await;
        let mut found: Vec<Investment> = state
            .investments
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn commit_funding(&self, commit: &FundingCommit) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let investment_id = &commit.investment.id;
        let stored = state
            .investments
            .get(investment_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Investment",
                id: investment_id.clone(),
            })?;
        if stored.status != commit.expected_investment_status {
            return Err(StoreError::StaleState(format!(
                "investment {} is {}, expected {}",
                investment_id, stored.status, commit.expected_investment_status
            )));
        }
        state.check_business_version(&commit.business.id, commit.expected_business_version)?;

        state
            .investments
            .insert(investment_id.clone(), commit.investment.clone());
        state.write_business(&commit.business, commit.expected_business_version);
        debug!(
            "Committed funding change: investment {} -> {}, business {} raised {}",
            investment_id, commit.investment.status, commit.business.id, commit.business.raised_amount
        );
        Ok(())
    }

    async fn insert_performance(&self, performance: &BusinessPerformance) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.performances.contains_key(&performance.id) {
            return Err(StoreError::Duplicate(format!("performance id {}", performance.id)));
        }
        if state
            .performances
            .values()
            .any(|p| p.business_id == performance.business_id && p.period == performance.period)
        {
            return Err(StoreError::Duplicate(format!(
                "performance for business {} in {}",
                performance.business_id, performance.period
            )));
        }
        state
            .performances
            .insert(performance.id.clone(), performance.clone());
        Ok(())
    }

    async fn get_performance(&self, id: &str) -> StoreResult<Option<BusinessPerformance>> {
        Ok(self.state.lock().await.performances.get(id).cloned())
    }

    async fn update_performance(
        &self,
        performance: &BusinessPerformance,
        expected_status: PerformanceStatus,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .performances
            .get_mut(&performance.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "BusinessPerformance",
                id: performance.id.clone(),
            })?;
        if slot.status != expected_status {
            return Err(StoreError::StaleState(format!(
                "performance {} is {}, expected {}",
                performance.id, slot.status, expected_status
            )));
        }
        *slot = performance.clone();
        Ok(())
    }

    async fn find_performance(
        &self,
        business_id: &str,
        period: ReportingPeriod,
    ) -> StoreResult<Option<BusinessPerformance>> {
        let state = self.state.lock().await;
        Ok(state
            .performances
            .values()
            .find(|p| p.business_id == business_id && p.period == period)
            .cloned())
    }

    async fn list_performances(&self, business_id: &str) -> StoreResult<Vec<BusinessPerformance>> {
        let state = self.state.lock().await;
        let mut found: Vec<BusinessPerformance> = state
            .performances
            .values()
            .filter(|p| p.business_id == business_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.period);
        Ok(found)
    }

    async fn commit_approval(&self, commit: &ApprovalCommit) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let performance_id = &commit.performance.id;
        let stored = state
            .performances
            .get(performance_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "BusinessPerformance",
                id: performance_id.clone(),
            })?;
        if stored.status != commit.expected_status {
            return Err(StoreError::StaleState(format!(
                "performance {} is {}, expected {}",
                performance_id, stored.status, commit.expected_status
            )));
        }
        let business_id = stored.business_id.clone();
        state.check_business_version(&business_id, commit.expected_business_version)?;

        let mut batch_investments = HashSet::new();
        for d in &commit.distributions {
            if &d.performance_id != performance_id {
                return Err(StoreError::StaleState(format!(
                    "distribution {} belongs to performance {}",
                    d.id, d.performance_id
                )));
            }
            if state.distributions.contains_key(&d.id) {
                return Err(StoreError::Duplicate(format!("distribution id {}", d.id)));
            }
            let already = state
                .distributions
                .values()
                .any(|e| e.performance_id == d.performance_id && e.investment_id == d.investment_id);
            if already || !batch_investments.insert(d.investment_id.clone()) {
                return Err(StoreError::Duplicate(format!(
                    "distribution for performance {} and investment {}",
                    d.performance_id, d.investment_id
                )));
            }
        }

        state
            .performances
            .insert(performance_id.clone(), commit.performance.clone());
        for d in &commit.distributions {
            state.distributions.insert(d.id.clone(), d.clone());
        }
        debug!(
            "Committed approval of {} with {} distributions",
            performance_id,
            commit.distributions.len()
        );
        Ok(())
    }

    async fn get_distribution(&self, id: &str) -> StoreResult<Option<Distribution>> {
        Ok(self.state.lock().await.distributions.get(id).cloned())
    }

    async fn update_distribution(
        &self,
        distribution: &Distribution,
        expected_status: DistributionStatus,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .distributions
            .get_mut(&distribution.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Distribution",
                id: distribution.id.clone(),
            })?;
        if slot.status != expected_status {
            return Err(StoreError::StaleState(format!(
                "distribution {} is {}, expected {}",
                distribution.id, slot.status, expected_status
            )));
        }
        *slot = distribution.clone();
        Ok(())
    }

    async fn list_distributions(&self, filter: &DistributionFilter) -> StoreResult<Vec<Distribution>> {
        let state = self.state.lock().await;
        let mut found: Vec<Distribution> = state
            .distributions
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}
