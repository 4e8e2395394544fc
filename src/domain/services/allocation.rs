//! Proportional allocation of a period's profit or loss across investments
//!
//! Pure functions only: given an approved performance report and the
//! completed investments of its business, produce one pending distribution
//! per investment. Nothing here touches storage.

use crate::domain::entities::distribution::{CalculationSnapshot, Distribution};
use crate::domain::entities::investment::{Investment, InvestmentStatus};
use crate::domain::entities::performance::BusinessPerformance;
use crate::domain::value_objects::money::Money;
use chrono::{DateTime, Utc};

/// Sum of completed investment amounts
pub fn total_completed(investments: &[Investment]) -> Money {
    investments
        .iter()
        .filter(|i| i.status == InvestmentStatus::Completed)
        .map(|i| i.amount)
        .sum()
}

/// Share of one investment in `total`, as a percentage
pub fn share_percentage(investment: &Investment, total: Money) -> f64 {
    if investment.status != InvestmentStatus::Completed {
        return 0.0;
    }
    investment.amount.percentage_of(total)
}

/// Build the distribution batch for `performance`.
///
/// Investments that are not completed, or that belong to another business,
/// are skipped. An empty result is valid and means nothing is distributed.
pub fn allocate(
    performance: &BusinessPerformance,
    investments: &[Investment],
    created_by: &str,
    at: DateTime<Utc>,
    mut next_id: impl FnMut() -> String,
) -> Vec<Distribution> {
    let eligible: Vec<&Investment> = investments
        .iter()
        .filter(|i| {
            i.status == InvestmentStatus::Completed && i.business_id == performance.business_id
        })
        .collect();
    if eligible.is_empty() {
        return Vec::new();
    }

    let total: Money = eligible.iter().map(|i| i.amount).sum();
    if total.is_zero() {
        return Vec::new();
    }

    eligible
        .into_iter()
        .map(|investment| {
            let snapshot = CalculationSnapshot::new(
                investment.amount,
                total,
                performance.figures.profit,
                performance.figures.loss,
            );
            Distribution::new(
                next_id(),
                performance.business_id.clone(),
                performance.id.clone(),
                investment.investor_id.clone(),
                investment.id.clone(),
                snapshot,
                performance.period,
                created_by,
                at,
            )
        })
        .collect()
}
