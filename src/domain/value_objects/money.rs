use crate::domain::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Non-negative, finite currency amount
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Money(f64);

impl Money {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }
        Ok(Money(value))
    }

    pub fn zero() -> Self {
        Money(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    pub fn add(&self, other: Money) -> Money {
        // Sum of two finite non-negative values stays valid
        Money(self.0 + other.0)
    }

    /// Subtract, flooring at zero
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0.0))
    }

    /// `self` as a percentage of `total`; zero when `total` is zero
    pub fn percentage_of(&self, total: Money) -> f64 {
        if total.0 > 0.0 {
            self.0 / total.0 * 100.0
        } else {
            0.0
        }
    }

    /// Portion of `self` corresponding to `percentage` (0-100)
    pub fn portion(&self, percentage: f64) -> Money {
        if !percentage.is_finite() || percentage <= 0.0 {
            return Money::zero();
        }
        Money(percentage / 100.0 * self.0)
    }
}

impl TryFrom<f64> for Money {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc.add(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_new_valid() {
        let money = Money::new(100.0);
        assert!(money.is_ok());
        assert_eq!(money.unwrap().value(), 100.0);
    }

    #[test]
    fn test_money_new_negative() {
        assert_eq!(Money::new(-1.0), Err(ValidationError::MustBeNonNegative));
    }

    #[test]
    fn test_money_new_nan() {
        assert_eq!(Money::new(f64::NAN), Err(ValidationError::MustBeFinite));
        assert_eq!(Money::new(f64::INFINITY), Err(ValidationError::MustBeFinite));
    }

    #[test]
    fn test_money_saturating_sub() {
        let a = Money::new(50.0).unwrap();
        let b = Money::new(80.0).unwrap();
        assert_eq!(b.saturating_sub(a).value(), 30.0);
        assert_eq!(a.saturating_sub(b).value(), 0.0);
    }

    #[test]
    fn test_percentage_of() {
        let part = Money::new(6_000.0).unwrap();
        let total = Money::new(10_000.0).unwrap();
        assert!((part.percentage_of(total) - 60.0).abs() < 1e-9);
        assert_eq!(part.percentage_of(Money::zero()), 0.0);
    }

    #[test]
    fn test_portion() {
        let profit = Money::new(20_000.0).unwrap();
        assert!((profit.portion(40.0).value() - 8_000.0).abs() < 1e-9);
        assert_eq!(profit.portion(0.0).value(), 0.0);
        assert_eq!(profit.portion(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_sum() {
        let total: Money = [1.5, 2.5, 6.0]
            .iter()
            .map(|v| Money::new(*v).unwrap())
            .sum();
        assert_eq!(total.value(), 10.0);
    }

    #[test]
    fn test_serde_rejects_negative() {
        let parsed: Result<Money, _> = serde_json::from_str("-5.0");
        assert!(parsed.is_err());
        let ok: Money = serde_json::from_str("12.5").unwrap();
        assert_eq!(ok.value(), 12.5);
    }
}
