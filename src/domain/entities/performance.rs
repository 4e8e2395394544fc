//! BusinessPerformance entity - one quarterly financial report
//!
//! Status moves strictly forward: draft -> submitted -> verified -> approved.

use crate::domain::errors::{DomainError, DomainResult, ValidationError, Violations};
use crate::domain::value_objects::money::Money;
use crate::domain::value_objects::period::ReportingPeriod;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    Draft,
    Submitted,
    Verified,
    Approved,
}

impl PerformanceStatus {
    /// Verified and approved reports are trusted as a growth baseline
    pub fn is_trusted(&self) -> bool {
        matches!(self, PerformanceStatus::Verified | PerformanceStatus::Approved)
    }
}

impl std::fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformanceStatus::Draft => write!(f, "draft"),
            PerformanceStatus::Submitted => write!(f, "submitted"),
            PerformanceStatus::Verified => write!(f, "verified"),
            PerformanceStatus::Approved => write!(f, "approved"),
        }
    }
}

impl std::str::FromStr for PerformanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PerformanceStatus::Draft),
            "submitted" => Ok(PerformanceStatus::Submitted),
            "verified" => Ok(PerformanceStatus::Verified),
            "approved" => Ok(PerformanceStatus::Approved),
            other => Err(ValidationError::UnknownVariant {
                kind: "performance status",
                value: other.to_string(),
            }),
        }
    }
}

/// Revenue/expense figures plus everything derived from them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceFigures {
    pub revenue: Money,
    pub expenses: Money,
    pub profit: Money,
    pub loss: Money,
    pub profit_margin: f64,
    pub expense_ratio: f64,
}

impl PerformanceFigures {
    /// Single point where profit, loss and ratios are computed.
    /// Exactly one of profit/loss is non-zero unless revenue equals expenses.
    pub fn derive(revenue: Money, expenses: Money) -> Self {
        let profit = revenue.saturating_sub(expenses);
        let loss = expenses.saturating_sub(revenue);
        let (profit_margin, expense_ratio) = if revenue.value() > 0.0 {
            (
                profit.value() / revenue.value() * 100.0,
                expenses.value() / revenue.value() * 100.0,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            revenue,
            expenses,
            profit,
            loss,
            profit_margin,
            expense_ratio,
        }
    }

    pub fn from_amounts(revenue: f64, expenses: f64) -> DomainResult<Self> {
        let mut violations = Violations::new();
        let revenue = Money::new(revenue).unwrap_or_else(|e| {
            violations.push(e.at("revenue"));
            Money::zero()
        });
        let expenses = Money::new(expenses).unwrap_or_else(|e| {
            violations.push(e.at("expenses"));
            Money::zero()
        });
        violations.into_result()?;
        Ok(Self::derive(revenue, expenses))
    }
}

/// Named line item of the revenue or expense breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub category: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceBreakdown {
    pub revenue: Vec<BreakdownItem>,
    pub expenses: Vec<BreakdownItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewTrail {
    pub submitted_by: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verification_notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessPerformance {
    pub id: String,
    pub business_id: String,
    pub period: ReportingPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub figures: PerformanceFigures,
    /// Percent change in revenue against the preceding trusted quarter
    pub revenue_growth: Option<f64>,
    pub breakdown: PerformanceBreakdown,
    pub status: PerformanceStatus,
    pub review: ReviewTrail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessPerformance {
    pub fn draft(
        id: String,
        business_id: String,
        period: ReportingPeriod,
        figures: PerformanceFigures,
        breakdown: PerformanceBreakdown,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require_id(&id, "id");
        violations.require_id(&business_id, "business_id");
        violations.into_result()?;

        Ok(BusinessPerformance {
            id,
            business_id,
            period,
            start_date: period.start_date(),
            end_date: period.end_date(),
            figures,
            revenue_growth: None,
            breakdown,
            status: PerformanceStatus::Draft,
            review: ReviewTrail::default(),
            created_at: at,
            updated_at: at,
        })
    }

    /// Compare against the preceding quarter; only trusted baselines with revenue count
    pub fn apply_growth_baseline(&mut self, previous: Option<&BusinessPerformance>) {
        self.revenue_growth = previous
            .filter(|p| p.status.is_trusted() && p.figures.revenue.value() > 0.0)
            .map(|p| {
                let prev = p.figures.revenue.value();
                (self.figures.revenue.value() - prev) / prev * 100.0
            });
    }

    fn advance(
        &mut self,
        from: PerformanceStatus,
        to: PerformanceStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != from {
            return Err(DomainError::InvalidState(format!(
                "performance {} is {}, must be {} to become {}",
                self.id, self.status, from, to
            )));
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }

    pub fn submit(&mut self, submitted_by: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.advance(PerformanceStatus::Draft, PerformanceStatus::Submitted, at)?;
        self.review.submitted_by = Some(submitted_by.to_string());
        self.review.submitted_at = Some(at);
        Ok(())
    }

    pub fn verify(
        &mut self,
        verified_by: &str,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.advance(PerformanceStatus::Submitted, PerformanceStatus::Verified, at)?;
        self.review.verified_by = Some(verified_by.to_string());
        self.review.verified_at = Some(at);
        self.review.verification_notes = notes;
        Ok(())
    }

    pub fn approve(&mut self, approved_by: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.advance(PerformanceStatus::Verified, PerformanceStatus::Approved, at)?;
        self.review.approved_by = Some(approved_by.to_string());
        self.review.approved_at = Some(at);
        Ok(())
    }
}
