//! PerformanceWorkflowManager - quarterly reports from submission to approval.
//!
//! Approval is the only place distributions are created: the approved report
//! and its whole batch go to the store as one [`ApprovalCommit`].

use crate::domain::entities::caller::CallerContext;
use crate::domain::entities::distribution::Distribution;
use crate::domain::entities::performance::{
    BusinessPerformance, PerformanceBreakdown, PerformanceFigures, PerformanceStatus,
};
use crate::domain::errors::{DomainError, DomainResult, Violations};
use crate::domain::repositories::ledger_store::{ApprovalCommit, LedgerStore, StoreError};
use crate::domain::services::distribution_engine::DistributionEngine;
use crate::domain::services::ids;
use crate::domain::value_objects::period::ReportingPeriod;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPerformance {
    pub business_id: String,
    pub year: i32,
    pub quarter: u8,
    pub revenue: f64,
    pub expenses: f64,
    #[serde(default)]
    pub breakdown: PerformanceBreakdown,
}

/// Result of approving a report: the report and the batch created with it
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub performance: BusinessPerformance,
    pub distributions: Vec<Distribution>,
}

pub struct PerformanceWorkflowManager {
    store: Arc<dyn LedgerStore>,
    engine: Arc<DistributionEngine>,
    max_commit_retries: u32,
}

impl PerformanceWorkflowManager {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        engine: Arc<DistributionEngine>,
        max_commit_retries: u32,
    ) -> Self {
        Self {
            store,
            engine,
            max_commit_retries,
        }
    }

    pub async fn get_performance(&self, performance_id: &str) -> DomainResult<BusinessPerformance> {
        self.store
            .get_performance(performance_id)
            .await?
            .ok_or_else(|| DomainError::not_found("BusinessPerformance", performance_id))
    }

    /// Validate the request and build a draft with growth already applied
    async fn prepare(
        &self,
        ctx: &CallerContext,
        request: SubmitPerformance,
    ) -> DomainResult<BusinessPerformance> {
        let mut violations = Violations::new();
        let period = ReportingPeriod::new(request.year, request.quarter)
            .map_err(|e| violations.push(e.at("period")))
            .ok();
        let figures = PerformanceFigures::from_amounts(request.revenue, request.expenses)
            .map_err(|e| {
                for v in e.violations() {
                    violations.push(v.clone());
                }
            })
            .ok();
        violations.into_result()?;
        let (Some(period), Some(figures)) = (period, figures) else {
            return Err(DomainError::Internal(
                "validated performance input was incomplete".to_string(),
            ));
        };

        let business = self
            .store
            .get_business(&request.business_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Business", &request.business_id))?;
        if business.owner_id != ctx.id {
            return Err(DomainError::Forbidden(format!(
                "only the owner of business {} may report its performance",
                business.id
            )));
        }
        if let Some(existing) = self.store.find_performance(&business.id, period).await? {
            return Err(DomainError::Conflict(format!(
                "performance for {} already exists for business {} ({})",
                period, business.id, existing.id
            )));
        }

        let mut performance = BusinessPerformance::draft(
            ids::new_id("perf"),
            business.id,
            period,
            figures,
            request.breakdown,
            Utc::now(),
        )?;
        let previous = self
            .store
            .find_performance(&performance.business_id, period.previous())
            .await?;
        performance.apply_growth_baseline(previous.as_ref());
        Ok(performance)
    }

    /// Submit a quarterly report; it is stored directly as `submitted`
    pub async fn submit_performance(
        &self,
        ctx: &CallerContext,
        request: SubmitPerformance,
    ) -> DomainResult<BusinessPerformance> {
        let mut performance = self.prepare(ctx, request).await?;
        performance.submit(&ctx.id, Utc::now())?;
        self.store.insert_performance(&performance).await?;
        info!(
            "Submitted performance {} for business {} {}: revenue {}, expenses {}, growth {:?}",
            performance.id,
            performance.business_id,
            performance.period,
            performance.figures.revenue,
            performance.figures.expenses,
            performance.revenue_growth
        );
        Ok(performance)
    }

    /// Store a report as `draft` for later submission
    pub async fn save_draft_performance(
        &self,
        ctx: &CallerContext,
        request: SubmitPerformance,
    ) -> DomainResult<BusinessPerformance> {
        let performance = self.prepare(ctx, request).await?;
        self.store.insert_performance(&performance).await?;
        info!(
            "Saved draft performance {} for business {} {}",
            performance.id, performance.business_id, performance.period
        );
        Ok(performance)
    }

    pub async fn submit_draft(
        &self,
        ctx: &CallerContext,
        performance_id: &str,
    ) -> DomainResult<BusinessPerformance> {
        let mut performance = self.get_performance(performance_id).await?;
        let business = self
            .store
            .get_business(&performance.business_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Business", &performance.business_id))?;
        if business.owner_id != ctx.id {
            return Err(DomainError::Forbidden(format!(
                "only the owner of business {} may submit its performance",
                business.id
            )));
        }
        performance.submit(&ctx.id, Utc::now())?;
        self.store
            .update_performance(&performance, PerformanceStatus::Draft)
            .await?;
        info!("Submitted draft performance {}", performance.id);
        Ok(performance)
    }

    pub async fn verify_performance(
        &self,
        ctx: &CallerContext,
        performance_id: &str,
        notes: Option<String>,
    ) -> DomainResult<BusinessPerformance> {
        ctx.require_admin("verify performance reports")?;
        let mut performance = self.get_performance(performance_id).await?;
        performance.verify(&ctx.id, notes, Utc::now())?;
        self.store
            .update_performance(&performance, PerformanceStatus::Submitted)
            .await?;
        info!("Verified performance {} by {}", performance.id, ctx.id);
        Ok(performance)
    }

    /// Approve a verified report and create its distribution batch atomically.
    ///
    /// The batch is allocated against the business version read first; if a
    /// settlement or refund lands before the commit, the batch is rebuilt.
    pub async fn approve_performance(
        &self,
        ctx: &CallerContext,
        performance_id: &str,
    ) -> DomainResult<ApprovalOutcome> {
        ctx.require_admin("approve performance reports")?;
        let mut attempt = 0;
        loop {
            let mut performance = self.get_performance(performance_id).await?;
            let now = Utc::now();
            performance.approve(&ctx.id, now)?;

            let business = self
                .store
                .get_business(&performance.business_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Business", &performance.business_id))?;
            let distributions = self.engine.build_batch(&performance, &ctx.id, now).await?;
            let commit = ApprovalCommit {
                performance: performance.clone(),
                expected_status: PerformanceStatus::Verified,
                distributions: distributions.clone(),
                expected_business_version: business.version,
            };
            match self.store.commit_approval(&commit).await {
                Ok(()) => {
                    info!(
                        "Approved performance {} ({} {}): profit {}, loss {}, {} distributions created",
                        performance.id,
                        performance.business_id,
                        performance.period,
                        performance.figures.profit,
                        performance.figures.loss,
                        distributions.len()
                    );
                    return Ok(ApprovalOutcome {
                        performance,
                        distributions,
                    });
                }
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_commit_retries => {
                    attempt += 1;
                    warn!(
                        "Business {} changed while approving {}, reallocating ({}/{})",
                        business.id, performance_id, attempt, self.max_commit_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reports of one business ordered by period
    pub async fn list_business_performances(
        &self,
        business_id: &str,
    ) -> DomainResult<Vec<BusinessPerformance>> {
        Ok(self.store.list_performances(business_id).await?)
    }
}
