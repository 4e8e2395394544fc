//! Business entity - a funding campaign and its running totals

use crate::domain::errors::{DomainError, DomainResult, ValidationError, Violations};
use crate::domain::value_objects::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessStatus {
    Open,
    Funded,
    Closed,
}

impl std::fmt::Display for BusinessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusinessStatus::Open => write!(f, "open"),
            BusinessStatus::Funded => write!(f, "funded"),
            BusinessStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for BusinessStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(BusinessStatus::Open),
            "funded" => Ok(BusinessStatus::Funded),
            "closed" => Ok(BusinessStatus::Closed),
            other => Err(ValidationError::UnknownVariant {
                kind: "business status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BusinessMetrics {
    pub total_investors: u32,
    pub average_investment: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub funding_goal: Money,
    pub raised_amount: Money,
    pub status: BusinessStatus,
    pub metrics: BusinessMetrics,
    /// Optimistic-concurrency token, bumped by the store on every write
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn new(
        id: String,
        name: String,
        owner_id: String,
        funding_goal: f64,
    ) -> DomainResult<Self> {
        let mut violations = Violations::new();
        violations.require_id(&id, "id");
        violations.require_id(&owner_id, "owner_id");
        violations.check(!name.trim().is_empty(), "name", "is required");
        let goal = match Money::new(funding_goal) {
            Ok(goal) if goal.value() > 0.0 => Some(goal),
            Ok(_) => {
                violations.check(false, "funding_goal", "must be positive");
                None
            }
            Err(e) => {
                violations.push(e.at("funding_goal"));
                None
            }
        };
        violations.into_result()?;

        let now = Utc::now();
        Ok(Business {
            id,
            name,
            owner_id,
            funding_goal: goal.unwrap_or_default(),
            raised_amount: Money::zero(),
            status: BusinessStatus::Open,
            metrics: BusinessMetrics::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_fully_funded(&self) -> bool {
        self.raised_amount >= self.funding_goal
    }

    /// Whether new investments may be opened against this business
    pub fn accepts_investment(&self) -> bool {
        self.status == BusinessStatus::Open && !self.is_fully_funded()
    }

    /// Apply a settled investment to the running totals
    pub fn credit(&mut self, amount: Money, at: DateTime<Utc>) {
        self.raised_amount = self.raised_amount.add(amount);
        self.metrics.total_investors += 1;
        self.rederive(at);
    }

    /// Reverse a previously credited investment
    pub fn debit(&mut self, amount: Money, at: DateTime<Utc>) {
        self.raised_amount = self.raised_amount.saturating_sub(amount);
        self.metrics.total_investors = self.metrics.total_investors.saturating_sub(1);
        self.rederive(at);
    }

    pub fn close(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status == BusinessStatus::Closed {
            return Err(DomainError::InvalidState(format!(
                "business {} is already closed",
                self.id
            )));
        }
        self.status = BusinessStatus::Closed;
        self.updated_at = at;
        Ok(())
    }

    fn rederive(&mut self, at: DateTime<Utc>) {
        self.metrics.average_investment = if self.metrics.total_investors > 0 {
            Money::new(self.raised_amount.value() / self.metrics.total_investors as f64)
                .unwrap_or_default()
        } else {
            Money::zero()
        };

        if self.status != BusinessStatus::Closed {
            self.status = if self.is_fully_funded() {
                BusinessStatus::Funded
            } else {
                BusinessStatus::Open
            };
        }
        self.updated_at = at;
    }
}
