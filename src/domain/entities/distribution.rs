//! Distribution entity - one investor's share of one performance period
//!
//! The calculation snapshot is frozen at creation. Amounts are always
//! re-derived from the snapshot, never from live investment data.

use crate::domain::errors::{DomainError, DomainResult, ValidationError};
use crate::domain::value_objects::money::Money;
use crate::domain::value_objects::period::ReportingPeriod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Pending,
    Approved,
    Paid,
    Failed,
    Cancelled,
}

impl DistributionStatus {
    pub const ALL: [DistributionStatus; 5] = [
        DistributionStatus::Pending,
        DistributionStatus::Approved,
        DistributionStatus::Paid,
        DistributionStatus::Failed,
        DistributionStatus::Cancelled,
    ];
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionStatus::Pending => write!(f, "pending"),
            DistributionStatus::Approved => write!(f, "approved"),
            DistributionStatus::Paid => write!(f, "paid"),
            DistributionStatus::Failed => write!(f, "failed"),
            DistributionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for DistributionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DistributionStatus::Pending),
            "approved" => Ok(DistributionStatus::Approved),
            "paid" => Ok(DistributionStatus::Paid),
            "failed" => Ok(DistributionStatus::Failed),
            "cancelled" => Ok(DistributionStatus::Cancelled),
            other => Err(ValidationError::UnknownVariant {
                kind: "distribution status",
                value: other.to_string(),
            }),
        }
    }
}

/// `Mixed` is representable but unreachable while profit and loss are
/// mutually exclusive at the performance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    Profit,
    Loss,
    Mixed,
    Neutral,
}

impl DistributionType {
    pub fn classify(profit_share: Money, loss_share: Money) -> Self {
        match (profit_share.value() > 0.0, loss_share.value() > 0.0) {
            (true, false) => DistributionType::Profit,
            (false, true) => DistributionType::Loss,
            (true, true) => DistributionType::Mixed,
            (false, false) => DistributionType::Neutral,
        }
    }
}

impl std::fmt::Display for DistributionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionType::Profit => write!(f, "profit"),
            DistributionType::Loss => write!(f, "loss"),
            DistributionType::Mixed => write!(f, "mixed"),
            DistributionType::Neutral => write!(f, "neutral"),
        }
    }
}

/// Inputs of the allocation as they stood when the batch was created
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculationSnapshot {
    pub investment_amount: Money,
    pub total_business_investment: Money,
    pub share_percentage: f64,
    pub business_profit: Money,
    pub business_loss: Money,
}

impl CalculationSnapshot {
    pub fn new(
        investment_amount: Money,
        total_business_investment: Money,
        business_profit: Money,
        business_loss: Money,
    ) -> Self {
        Self {
            investment_amount,
            total_business_investment,
            share_percentage: investment_amount.percentage_of(total_business_investment),
            business_profit,
            business_loss,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionAmounts {
    pub profit_share: Money,
    pub loss_share: Money,
    /// Signed: negative when the period closed at a loss
    pub net_distribution: f64,
}

impl DistributionAmounts {
    pub fn from_snapshot(snapshot: &CalculationSnapshot) -> Self {
        let profit_share = snapshot.business_profit.portion(snapshot.share_percentage);
        let loss_share = snapshot.business_loss.portion(snapshot.share_percentage);
        Self {
            profit_share,
            loss_share,
            net_distribution: profit_share.value() - loss_share.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub method: String,
    pub transaction_id: String,
    pub processed_at: DateTime<Utc>,
    pub processed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub created_by: String,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub business_id: String,
    pub performance_id: String,
    pub investor_id: String,
    pub investment_id: String,
    pub snapshot: CalculationSnapshot,
    pub amounts: DistributionAmounts,
    pub distribution_type: DistributionType,
    pub status: DistributionStatus,
    pub period: ReportingPeriod,
    pub approval: Option<ApprovalRecord>,
    pub payout: Option<PayoutRecord>,
    pub failure_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub audit: AuditTrail,
    pub created_at: DateTime<Utc>,
}

impl Distribution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        business_id: String,
        performance_id: String,
        investor_id: String,
        investment_id: String,
        snapshot: CalculationSnapshot,
        period: ReportingPeriod,
        created_by: &str,
        at: DateTime<Utc>,
    ) -> Self {
        let amounts = DistributionAmounts::from_snapshot(&snapshot);
        Distribution {
            id,
            business_id,
            performance_id,
            investor_id,
            investment_id,
            snapshot,
            distribution_type: DistributionType::classify(amounts.profit_share, amounts.loss_share),
            amounts,
            status: DistributionStatus::Pending,
            period,
            approval: None,
            payout: None,
            failure_reason: None,
            cancellation_reason: None,
            audit: AuditTrail {
                created_by: created_by.to_string(),
                last_modified_by: created_by.to_string(),
                last_modified_at: at,
            },
            created_at: at,
        }
    }

    /// Re-derive amounts and type from the frozen snapshot; called before every persist
    pub fn recompute(&mut self) {
        self.amounts = DistributionAmounts::from_snapshot(&self.snapshot);
        self.distribution_type =
            DistributionType::classify(self.amounts.profit_share, self.amounts.loss_share);
    }

    fn touch(&mut self, by: &str, at: DateTime<Utc>) {
        self.audit.last_modified_by = by.to_string();
        self.audit.last_modified_at = at;
    }

    fn ensure_status(&self, allowed: &[DistributionStatus], action: &str) -> DomainResult<()> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        Err(DomainError::InvalidState(format!(
            "cannot {} distribution {} in status {}",
            action, self.id, self.status
        )))
    }

    pub fn approve(&mut self, by: &str, notes: Option<String>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(&[DistributionStatus::Pending], "approve")?;
        self.status = DistributionStatus::Approved;
        self.approval = Some(ApprovalRecord {
            approved_by: by.to_string(),
            approved_at: at,
            notes,
        });
        self.touch(by, at);
        Ok(())
    }

    pub fn mark_paid(&mut self, by: &str, details: PaymentDetails, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(&[DistributionStatus::Approved], "pay")?;
        if details.transaction_id.trim().is_empty() {
            return Err(DomainError::invalid_field(
                "payment.transaction_id",
                "is required",
            ));
        }
        self.status = DistributionStatus::Paid;
        self.payout = Some(PayoutRecord {
            method: details.method,
            transaction_id: details.transaction_id,
            processed_at: at,
            processed_by: by.to_string(),
        });
        self.touch(by, at);
        Ok(())
    }

    pub fn mark_failed(&mut self, by: &str, reason: String, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(
            &[DistributionStatus::Pending, DistributionStatus::Approved],
            "fail",
        )?;
        if reason.trim().is_empty() {
            return Err(DomainError::invalid_field("failure_reason", "is required"));
        }
        self.status = DistributionStatus::Failed;
        self.failure_reason = Some(reason);
        self.touch(by, at);
        Ok(())
    }

    pub fn cancel(&mut self, by: &str, reason: Option<String>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(&[DistributionStatus::Pending], "cancel")?;
        self.status = DistributionStatus::Cancelled;
        self.cancellation_reason = reason;
        self.touch(by, at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    fn money(v: f64) -> Money {
        Money::new(v).unwrap()
    }

    fn distribution(amount: f64, total: f64, profit: f64, loss: f64) -> Distribution {
        Distribution::new(
            "dist-1".to_string(),
            "biz-1".to_string(),
            "perf-1".to_string(),
            "investor-a".to_string(),
            "inv-1".to_string(),
            CalculationSnapshot::new(money(amount), money(total), money(profit), money(loss)),
            ReportingPeriod::new(2025, 1).unwrap(),
            "admin-1",
            Utc::now(),
        )
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            method: "bank_transfer".to_string(),
            transaction_id: "PAYOUT-1".to_string(),
        }
    }

    #[test]
    fn test_profit_share() {
        let d = distribution(6_000.0, 10_000.0, 20_000.0, 0.0);
        assert!((d.snapshot.share_percentage - 60.0).abs() < 1e-9);
        assert!((d.amounts.profit_share.value() - 12_000.0).abs() < 1e-6);
        assert_eq!(d.amounts.loss_share.value(), 0.0);
        assert!((d.amounts.net_distribution - 12_000.0).abs() < 1e-6);
        assert_eq!(d.distribution_type, DistributionType::Profit);
    }

    #[test]
    fn test_loss_share_is_negative_net() {
        let d = distribution(6_000.0, 10_000.0, 0.0, 15_000.0);
        assert!((d.amounts.loss_share.value() - 9_000.0).abs() < 1e-6);
        assert!((d.amounts.net_distribution + 9_000.0).abs() < 1e-6);
        assert_eq!(d.distribution_type, DistributionType::Loss);
    }

    #[test]
    fn test_break_even_is_neutral() {
        let d = distribution(6_000.0, 10_000.0, 0.0, 0.0);
        assert_eq!(d.distribution_type, DistributionType::Neutral);
    }

    #[test]
    fn test_classify_mixed() {
        assert_eq!(
            DistributionType::classify(money(1.0), money(1.0)),
            DistributionType::Mixed
        );
    }

    #[test]
    fn test_recompute_restores_amounts_from_snapshot() {
        let mut d = distribution(4_000.0, 10_000.0, 20_000.0, 0.0);
        d.amounts.profit_share = money(1.0);
        d.amounts.net_distribution = 1.0;
        d.recompute();
        assert!((d.amounts.profit_share.value() - 8_000.0).abs() < 1e-6);
        assert!((d.amounts.net_distribution - 8_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_approve_then_pay() {
        let mut d = distribution(6_000.0, 10_000.0, 20_000.0, 0.0);
        d.approve("admin-2", Some("ok".into()), Utc::now()).unwrap();
        assert_eq!(d.status, DistributionStatus::Approved);
        assert_eq!(d.audit.last_modified_by, "admin-2");

        d.mark_paid("admin-3", payment(), Utc::now()).unwrap();
        assert_eq!(d.status, DistributionStatus::Paid);
        assert_eq!(d.payout.as_ref().unwrap().processed_by, "admin-3");
        assert_eq!(d.audit.created_by, "admin-1");
        assert_eq!(d.audit.last_modified_by, "admin-3");
    }

    #[test]
    fn test_pay_requires_approval() {
        let mut d = distribution(6_000.0, 10_000.0, 20_000.0, 0.0);
        let err = d.mark_paid("admin", payment(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_fail_from_pending_or_approved() {
        let mut pending = distribution(1.0, 1.0, 1.0, 0.0);
        pending.mark_failed("admin", "bank rejected".into(), Utc::now())
            .unwrap();
        assert_eq!(pending.status, DistributionStatus::Failed);
        assert_eq!(pending.failure_reason.as_deref(), Some("bank rejected"));

        let mut approved = distribution(1.0, 1.0, 1.0, 0.0);
        approved.approve("admin", None, Utc::now()).unwrap();
        approved
            .mark_failed("admin", "account closed".into(), Utc::now())
            .unwrap();

        let mut paid = distribution(1.0, 1.0, 1.0, 0.0);
        paid.approve("admin", None, Utc::now()).unwrap();
        paid.mark_paid("admin", payment(), Utc::now()).unwrap();
        assert_eq!(
            paid.mark_failed("admin", "late".into(), Utc::now())
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_cancel_only_pending() {
        let mut d = distribution(1.0, 1.0, 1.0, 0.0);
        d.cancel("admin", Some("report withdrawn".into()), Utc::now())
            .unwrap();
        assert_eq!(d.status, DistributionStatus::Cancelled);
        assert_eq!(
            d.approve("admin", None, Utc::now()).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }
}
