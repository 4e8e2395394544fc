//! Database Models
//!
//! Row structs for businesses, investments, performance reports and
//! distributions. Scalar fields the store filters or guards on get their own
//! column; nested sub-records are stored as JSON text.

use super::DatabaseError;
use crate::domain::entities::business::{Business, BusinessMetrics};
use crate::domain::entities::distribution::Distribution;
use crate::domain::entities::investment::Investment;
use crate::domain::entities::performance::BusinessPerformance;
use crate::domain::value_objects::money::Money;
use crate::domain::value_objects::period::ReportingPeriod;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

fn to_json<T: Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::SerializationError(format!("{}: {}", column, e)))
}

fn opt_to_json<T: Serialize>(value: &Option<T>) -> Result<Option<String>, DatabaseError> {
    value.as_ref().map(to_json).transpose()
}

fn opt_from_json<T: DeserializeOwned>(
    column: &str,
    raw: &Option<String>,
) -> Result<Option<T>, DatabaseError> {
    raw.as_deref().map(|r| from_json(column, r)).transpose()
}

fn money(column: &str, value: f64) -> Result<Money, DatabaseError> {
    Money::new(value).map_err(|e| DatabaseError::SerializationError(format!("{}: {}", column, e)))
}

fn parse<T>(column: &str, raw: &str) -> Result<T, DatabaseError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| DatabaseError::SerializationError(format!("{}: {}", column, e)))
}

fn period(year: i64, quarter: i64) -> Result<ReportingPeriod, DatabaseError> {
    let year = i32::try_from(year)
        .map_err(|e| DatabaseError::SerializationError(format!("year: {}", e)))?;
    let quarter = u8::try_from(quarter)
        .map_err(|e| DatabaseError::SerializationError(format!("quarter: {}", e)))?;
    ReportingPeriod::new(year, quarter)
        .map_err(|e| DatabaseError::SerializationError(format!("period: {}", e)))
}

/// Business record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessRecord {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub funding_goal: f64,
    pub raised_amount: f64,
    pub status: String, // "open", "funded" or "closed"
    pub total_investors: i64,
    pub average_investment: f64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Business> for BusinessRecord {
    fn from(b: &Business) -> Self {
        Self {
            id: b.id.clone(),
            name: b.name.clone(),
            owner_id: b.owner_id.clone(),
            funding_goal: b.funding_goal.value(),
            raised_amount: b.raised_amount.value(),
            status: b.status.to_string(),
            total_investors: i64::from(b.metrics.total_investors),
            average_investment: b.metrics.average_investment.value(),
            version: b.version as i64,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

impl TryFrom<BusinessRecord> for Business {
    type Error = DatabaseError;

    fn try_from(r: BusinessRecord) -> Result<Self, Self::Error> {
        Ok(Business {
            funding_goal: money("funding_goal", r.funding_goal)?,
            raised_amount: money("raised_amount", r.raised_amount)?,
            status: parse("status", &r.status)?,
            metrics: BusinessMetrics {
                total_investors: u32::try_from(r.total_investors).map_err(|e| {
                    DatabaseError::SerializationError(format!("total_investors: {}", e))
                })?,
                average_investment: money("average_investment", r.average_investment)?,
            },
            version: u64::try_from(r.version)
                .map_err(|e| DatabaseError::SerializationError(format!("version: {}", e)))?,
            id: r.id,
            name: r.name,
            owner_id: r.owner_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Investment record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvestmentRecord {
    pub id: String,
    pub investor_id: String,
    pub business_id: String,
    pub amount: f64,
    pub status: String,
    pub transaction_id: String,
    pub payment_json: String,
    pub terms_json: String,
    pub tracking_json: String,
    pub refund_json: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Investment> for InvestmentRecord {
    type Error = DatabaseError;

    fn try_from(i: &Investment) -> Result<Self, Self::Error> {
        Ok(Self {
            id: i.id.clone(),
            investor_id: i.investor_id.clone(),
            business_id: i.business_id.clone(),
            amount: i.amount.value(),
            status: i.status.to_string(),
            transaction_id: i.payment.transaction_id.clone(),
            payment_json: to_json(&i.payment)?,
            terms_json: to_json(&i.terms)?,
            tracking_json: to_json(&i.tracking)?,
            refund_json: opt_to_json(&i.refund)?,
            created_at: i.created_at,
        })
    }
}

impl TryFrom<InvestmentRecord> for Investment {
    type Error = DatabaseError;

    fn try_from(r: InvestmentRecord) -> Result<Self, Self::Error> {
        Ok(Investment {
            amount: money("amount", r.amount)?,
            status: parse("status", &r.status)?,
            payment: from_json("payment_json", &r.payment_json)?,
            terms: from_json("terms_json", &r.terms_json)?,
            tracking: from_json("tracking_json", &r.tracking_json)?,
            refund: opt_from_json("refund_json", &r.refund_json)?,
            id: r.id,
            investor_id: r.investor_id,
            business_id: r.business_id,
            created_at: r.created_at,
        })
    }
}

/// Performance report record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PerformanceRecord {
    pub id: String,
    pub business_id: String,
    pub year: i64,
    pub quarter: i64,
    pub status: String,
    pub figures_json: String,
    pub revenue_growth: Option<f64>,
    pub breakdown_json: String,
    pub review_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&BusinessPerformance> for PerformanceRecord {
    type Error = DatabaseError;

    fn try_from(p: &BusinessPerformance) -> Result<Self, Self::Error> {
        Ok(Self {
            id: p.id.clone(),
            business_id: p.business_id.clone(),
            year: i64::from(p.period.year),
            quarter: i64::from(p.period.quarter),
            status: p.status.to_string(),
            figures_json: to_json(&p.figures)?,
            revenue_growth: p.revenue_growth,
            breakdown_json: to_json(&p.breakdown)?,
            review_json: to_json(&p.review)?,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
    }
}

impl TryFrom<PerformanceRecord> for BusinessPerformance {
    type Error = DatabaseError;

    fn try_from(r: PerformanceRecord) -> Result<Self, Self::Error> {
        let period = period(r.year, r.quarter)?;
        Ok(BusinessPerformance {
            start_date: period.start_date(),
            end_date: period.end_date(),
            period,
            status: parse("status", &r.status)?,
            figures: from_json("figures_json", &r.figures_json)?,
            revenue_growth: r.revenue_growth,
            breakdown: from_json("breakdown_json", &r.breakdown_json)?,
            review: from_json("review_json", &r.review_json)?,
            id: r.id,
            business_id: r.business_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Distribution record in database
///
/// `net_distribution` is kept as a column for SQL aggregation only; on load
/// the amounts are re-derived from the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DistributionRecord {
    pub id: String,
    pub business_id: String,
    pub performance_id: String,
    pub investor_id: String,
    pub investment_id: String,
    pub year: i64,
    pub quarter: i64,
    pub status: String,
    pub distribution_type: String,
    pub net_distribution: f64,
    pub snapshot_json: String,
    pub approval_json: Option<String>,
    pub payout_json: Option<String>,
    pub failure_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub audit_json: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Distribution> for DistributionRecord {
    type Error = DatabaseError;

    fn try_from(d: &Distribution) -> Result<Self, Self::Error> {
        Ok(Self {
            id: d.id.clone(),
            business_id: d.business_id.clone(),
            performance_id: d.performance_id.clone(),
            investor_id: d.investor_id.clone(),
            investment_id: d.investment_id.clone(),
            year: i64::from(d.period.year),
            quarter: i64::from(d.period.quarter),
            status: d.status.to_string(),
            distribution_type: d.distribution_type.to_string(),
            net_distribution: d.amounts.net_distribution,
            snapshot_json: to_json(&d.snapshot)?,
            approval_json: opt_to_json(&d.approval)?,
            payout_json: opt_to_json(&d.payout)?,
            failure_reason: d.failure_reason.clone(),
            cancellation_reason: d.cancellation_reason.clone(),
            audit_json: to_json(&d.audit)?,
            created_at: d.created_at,
        })
    }
}

impl TryFrom<DistributionRecord> for Distribution {
    type Error = DatabaseError;

    fn try_from(r: DistributionRecord) -> Result<Self, Self::Error> {
        let snapshot = from_json("snapshot_json", &r.snapshot_json)?;
        let mut distribution = Distribution::new(
            r.id,
            r.business_id,
            r.performance_id,
            r.investor_id,
            r.investment_id,
            snapshot,
            period(r.year, r.quarter)?,
            "",
            r.created_at,
        );
        distribution.status = parse("status", &r.status)?;
        distribution.approval = opt_from_json("approval_json", &r.approval_json)?;
        distribution.payout = opt_from_json("payout_json", &r.payout_json)?;
        distribution.failure_reason = r.failure_reason;
        distribution.cancellation_reason = r.cancellation_reason;
        distribution.audit = from_json("audit_json", &r.audit_json)?;
        Ok(distribution)
    }
}
