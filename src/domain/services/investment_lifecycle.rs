//! InvestmentLifecycleManager - opens, settles, cancels and refunds investments
//! and keeps the business funding totals in step with them.
//!
//! Settlement and refund touch two records (investment and business). Both
//! are handed to the store as one [`FundingCommit`] guarded by the business
//! version; a concurrent writer makes the commit fail with a version conflict
//! and the whole read-modify-commit sequence is retried.

use crate::domain::entities::business::Business;
use crate::domain::entities::caller::{CallerContext, Role};
use crate::domain::entities::investment::{
    Investment, InvestmentStatus, InvestmentTerms, PaymentMethod, SettlementEvidence,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::repositories::ledger_store::{
    FundingCommit, InvestmentFilter, LedgerStore, StoreError,
};
use crate::domain::services::allocation;
use crate::domain::services::ids;
use crate::domain::value_objects::investment_bounds::InvestmentBounds;
use crate::domain::value_objects::money::Money;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for opening a new investment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvestment {
    pub business_id: String,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub terms: Option<InvestmentTerms>,
    pub notes: Option<String>,
}

/// One investor's holdings across businesses
#[derive(Debug, Clone, Serialize)]
pub struct InvestorPortfolio {
    pub investor_id: String,
    pub investments: Vec<Investment>,
    /// Sum over completed investments only
    pub total_invested: Money,
    pub active_businesses: usize,
    pub pending_count: usize,
}

pub struct InvestmentLifecycleManager {
    store: Arc<dyn LedgerStore>,
    bounds: InvestmentBounds,
    max_commit_retries: u32,
}

impl InvestmentLifecycleManager {
    pub fn new(store: Arc<dyn LedgerStore>, bounds: InvestmentBounds, max_commit_retries: u32) -> Self {
        Self {
            store,
            bounds,
            max_commit_retries,
        }
    }

    pub async fn get_business(&self, business_id: &str) -> DomainResult<Business> {
        self.store
            .get_business(business_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Business", business_id))
    }

    pub async fn get_investment(&self, investment_id: &str) -> DomainResult<Investment> {
        self.store
            .get_investment(investment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Investment", investment_id))
    }

    /// Register a new funding campaign owned by the caller
    pub async fn register_business(
        &self,
        ctx: &CallerContext,
        name: &str,
        funding_goal: f64,
    ) -> DomainResult<Business> {
        if ctx.role == Role::Investor {
            return Err(DomainError::Forbidden(
                "investors may not register businesses".to_string(),
            ));
        }
        let business = Business::new(
            ids::new_id("biz"),
            name.to_string(),
            ctx.id.clone(),
            funding_goal,
        )?;
        self.store.insert_business(&business).await?;
        info!(
            "Registered business {} ({}) with funding goal {}",
            business.id, business.name, business.funding_goal
        );
        Ok(business)
    }

    /// Close a business to new investment (owner or admin)
    pub async fn close_business(&self, ctx: &CallerContext, business_id: &str) -> DomainResult<Business> {
        let mut business = self.get_business(business_id).await?;
        ctx.require_self_or_admin(&business.owner_id, "close this business")?;
        let expected_version = business.version;
        business.close(Utc::now())?;
        self.store.update_business(&business, expected_version).await?;
        business.version = expected_version + 1;
        info!("Closed business {}", business_id);
        Ok(business)
    }

    /// Open a pending investment for the caller
    pub async fn create_investment(
        &self,
        ctx: &CallerContext,
        request: CreateInvestment,
    ) -> DomainResult<Investment> {
        self.bounds
            .check(request.amount)
            .map_err(|v| DomainError::Validation(vec![v]))?;

        let business = self.get_business(&request.business_id).await?;
        if !business.accepts_investment() {
            return Err(DomainError::InvalidState(format!(
                "business {} is not accepting investments (status {}, raised {} of {})",
                business.id, business.status, business.raised_amount, business.funding_goal
            )));
        }
        if business.owner_id == ctx.id {
            return Err(DomainError::Forbidden(
                "business owners cannot invest in their own business".to_string(),
            ));
        }
        if let Some(existing) = self
            .store
            .find_active_investment(&ctx.id, &business.id)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "investor {} already has a {} investment ({}) in business {}",
                ctx.id, existing.status, existing.id, business.id
            )));
        }

        let investment = Investment::new(
            ids::new_id("inv"),
            ctx.id.clone(),
            business.id.clone(),
            request.amount,
            request.payment_method,
            ids::transaction_id(),
            request.payment_reference,
            request.terms.unwrap_or_default(),
            request.notes,
            Utc::now(),
        )?;
        self.store.insert_investment(&investment).await?;

        info!(
            "Created investment {} by {} in {} for {} ({})",
            investment.id,
            investment.investor_id,
            investment.business_id,
            investment.amount,
            investment.payment.transaction_id
        );
        Ok(investment)
    }

    /// Confirm payment and credit the business
    pub async fn settle_investment(
        &self,
        ctx: &CallerContext,
        investment_id: &str,
        evidence: SettlementEvidence,
    ) -> DomainResult<Investment> {
        let mut attempt = 0;
        loop {
            let investment = self.get_investment(investment_id).await?;
            if investment.investor_id != ctx.id {
                return Err(DomainError::Forbidden(format!(
                    "only the investor who created investment {} may settle it",
                    investment_id
                )));
            }
            let mut settled = investment.clone();
            let now = Utc::now();
            settled.settle(&evidence, now)?;

            let mut business = self.get_business(&investment.business_id).await?;
            let expected_business_version = business.version;
            business.credit(settled.amount, now);

            let commit = FundingCommit {
                investment: settled.clone(),
                expected_investment_status: InvestmentStatus::Pending,
                business: business.clone(),
                expected_business_version,
            };
            match self.store.commit_funding(&commit).await {
                Ok(()) => {
                    info!(
                        "Settled investment {}: business {} raised {} / {} ({}, {} investors)",
                        settled.id,
                        business.id,
                        business.raised_amount,
                        business.funding_goal,
                        business.status,
                        business.metrics.total_investors
                    );
                    return Ok(settled);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_commit_retries => {
                    attempt += 1;
                    warn!(
                        "Business {} changed during settlement of {}, retrying ({}/{})",
                        business.id, investment_id, attempt, self.max_commit_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Abandon a pending investment; business totals are untouched
    pub async fn cancel_investment(
        &self,
        ctx: &CallerContext,
        investment_id: &str,
        reason: Option<String>,
    ) -> DomainResult<Investment> {
        let mut investment = self.get_investment(investment_id).await?;
        ctx.require_self_or_admin(&investment.investor_id, "cancel this investment")?;
        investment.cancel(reason, Utc::now())?;
        self.store
            .update_investment(&investment, InvestmentStatus::Pending)
            .await?;
        info!("Cancelled investment {}", investment_id);
        Ok(investment)
    }

    /// Return a completed investment and take it back out of the business totals
    pub async fn refund_investment(
        &self,
        ctx: &CallerContext,
        investment_id: &str,
        reason: &str,
    ) -> DomainResult<Investment> {
        ctx.require_admin("refund investments")?;
        let mut attempt = 0;
        loop {
            let mut refunded = self.get_investment(investment_id).await?;
            let now = Utc::now();
            refunded.refund(reason.to_string(), &ctx.id, now)?;

            let mut business = self.get_business(&refunded.business_id).await?;
            let expected_business_version = business.version;
            business.debit(refunded.amount, now);

            let commit = FundingCommit {
                investment: refunded.clone(),
                expected_investment_status: InvestmentStatus::Completed,
                business: business.clone(),
                expected_business_version,
            };
            match self.store.commit_funding(&commit).await {
                Ok(()) => {
                    info!(
                        "Refunded investment {} ({}): business {} raised now {} ({})",
                        refunded.id, refunded.amount, business.id, business.raised_amount, business.status
                    );
                    return Ok(refunded);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_commit_retries => {
                    attempt += 1;
                    warn!(
                        "Business {} changed during refund of {}, retrying ({}/{})",
                        business.id, investment_id, attempt, self.max_commit_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Current share of an investment in its business, in percent
    pub async fn share_percentage(&self, investment_id: &str) -> DomainResult<f64> {
        let investment = self.get_investment(investment_id).await?;
        let completed = self
            .store
            .list_investments(&InvestmentFilter {
                business_id: Some(investment.business_id.clone()),
                status: Some(InvestmentStatus::Completed),
                ..Default::default()
            })
            .await?;
        let total = allocation::total_completed(&completed);
        let share = allocation::share_percentage(&investment, total);
        debug!(
            "Investment {} holds {:.4}% of {} in {}",
            investment_id, share, total, investment.business_id
        );
        Ok(share)
    }

    pub async fn list_investor_investments(
        &self,
        investor_id: &str,
        status: Option<InvestmentStatus>,
    ) -> DomainResult<Vec<Investment>> {
        Ok(self
            .store
            .list_investments(&InvestmentFilter {
                investor_id: Some(investor_id.to_string()),
                status,
                ..Default::default()
            })
            .await?)
    }

    pub async fn investor_portfolio(&self, investor_id: &str) -> DomainResult<InvestorPortfolio> {
        let investments = self.list_investor_investments(investor_id, None).await?;
        let completed = investments
            .iter()
            .filter(|i| i.status == InvestmentStatus::Completed);
        let total_invested: Money = completed.clone().map(|i| i.amount).sum();
        let active_businesses = completed
            .map(|i| i.business_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let pending_count = investments
            .iter()
            .filter(|i| i.status == InvestmentStatus::Pending)
            .count();

        Ok(InvestorPortfolio {
            investor_id: investor_id.to_string(),
            investments,
            total_invested,
            active_businesses,
            pending_count,
        })
    }
}
