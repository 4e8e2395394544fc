//! Investment entity and its lifecycle transitions
//!
//! Legal transitions:
//! - `pending -> completed` (settlement)
//! - `pending -> failed` (cancellation)
//! - `completed -> refunded`

use crate::domain::errors::{DomainError, DomainResult, ValidationError, Violations};
use crate::domain::value_objects::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Pending,
    Completed,
    Refunded,
    Failed,
}

impl InvestmentStatus {
    pub const ALL: [InvestmentStatus; 4] = [
        InvestmentStatus::Pending,
        InvestmentStatus::Completed,
        InvestmentStatus::Refunded,
        InvestmentStatus::Failed,
    ];

    /// Pending and completed investments block a second one for the same pair
    pub fn is_active(&self) -> bool {
        matches!(self, InvestmentStatus::Pending | InvestmentStatus::Completed)
    }
}

impl std::fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvestmentStatus::Pending => write!(f, "pending"),
            InvestmentStatus::Completed => write!(f, "completed"),
            InvestmentStatus::Refunded => write!(f, "refunded"),
            InvestmentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for InvestmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvestmentStatus::Pending),
            "completed" => Ok(InvestmentStatus::Completed),
            "refunded" => Ok(InvestmentStatus::Refunded),
            "failed" => Ok(InvestmentStatus::Failed),
            other => Err(ValidationError::UnknownVariant {
                kind: "investment status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    MobileMoney,
    Wallet,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::MobileMoney => write!(f, "mobile_money"),
            PaymentMethod::Wallet => write!(f, "wallet"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "card" => Ok(PaymentMethod::Card),
            "mobile_money" => Ok(PaymentMethod::MobileMoney),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(ValidationError::UnknownVariant {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub transaction_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Informational terms; never used in allocation math
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTerms {
    pub expected_return_pct: f64,
    pub period_months: u32,
    pub risk_level: RiskLevel,
}

impl Default for InvestmentTerms {
    fn default() -> Self {
        Self {
            expected_return_pct: 0.0,
            period_months: 12,
            risk_level: RiskLevel::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub invested_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub amount: Money,
    pub reason: String,
    pub processed_at: DateTime<Utc>,
    pub processed_by: String,
}

/// Settlement evidence supplied by the payment stub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEvidence {
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: String,
    pub investor_id: String,
    pub business_id: String,
    pub amount: Money,
    pub status: InvestmentStatus,
    pub payment: PaymentRecord,
    pub terms: InvestmentTerms,
    pub tracking: Tracking,
    pub refund: Option<RefundRecord>,
    pub created_at: DateTime<Utc>,
}

impl Investment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        investor_id: String,
        business_id: String,
        amount: f64,
        method: PaymentMethod,
        transaction_id: String,
        reference: Option<String>,
        terms: InvestmentTerms,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require_id(&id, "id");
        violations.require_id(&investor_id, "investor_id");
        violations.require_id(&business_id, "business_id");
        violations.require_id(&transaction_id, "payment.transaction_id");
        let amount = match Money::new(amount) {
            Ok(m) => m,
            Err(e) => {
                violations.push(e.at("amount"));
                Money::zero()
            }
        };
        violations.into_result()?;

        Ok(Investment {
            id,
            investor_id,
            business_id,
            amount,
            status: InvestmentStatus::Pending,
            payment: PaymentRecord {
                transaction_id,
                method,
                status: PaymentStatus::Pending,
                reference,
                paid_at: None,
            },
            terms,
            tracking: Tracking {
                invested_at: None,
                last_updated: at,
                notes,
            },
            refund: None,
            created_at: at,
        })
    }

    fn expect_status(&self, expected: InvestmentStatus, action: &str) -> DomainResult<()> {
        if self.status != expected {
            return Err(DomainError::InvalidState(format!(
                "cannot {} investment {}: status is {}, expected {}",
                action, self.id, self.status, expected
            )));
        }
        Ok(())
    }

    /// `pending -> completed`
    pub fn settle(&mut self, evidence: &SettlementEvidence, at: DateTime<Utc>) -> DomainResult<()> {
        self.expect_status(InvestmentStatus::Pending, "settle")?;
        self.status = InvestmentStatus::Completed;
        if let Some(method) = evidence.method {
            self.payment.method = method;
        }
        if evidence.reference.is_some() {
            self.payment.reference = evidence.reference.clone();
        }
        self.payment.status = PaymentStatus::Completed;
        self.payment.paid_at = Some(at);
        self.tracking.invested_at = Some(at);
        self.tracking.last_updated = at;
        Ok(())
    }

    /// `pending -> failed`
    pub fn cancel(&mut self, reason: Option<String>, at: DateTime<Utc>) -> DomainResult<()> {
        self.expect_status(InvestmentStatus::Pending, "cancel")?;
        self.status = InvestmentStatus::Failed;
        self.payment.status = PaymentStatus::Failed;
        if let Some(reason) = reason {
            self.tracking.notes = Some(reason);
        }
        self.tracking.last_updated = at;
        Ok(())
    }

    /// `completed -> refunded`
    pub fn refund(&mut self, reason: String, processed_by: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.expect_status(InvestmentStatus::Completed, "refund")?;
        if reason.trim().is_empty() {
            return Err(DomainError::invalid_field("reason", "is required"));
        }
        self.status = InvestmentStatus::Refunded;
        self.payment.status = PaymentStatus::Refunded;
        self.refund = Some(RefundRecord {
            amount: self.amount,
            reason,
            processed_at: at,
            processed_by: processed_by.to_string(),
        });
        self.tracking.last_updated = at;
        Ok(())
    }
}
