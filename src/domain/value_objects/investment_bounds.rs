use crate::domain::errors::{FieldViolation, ValidationError};
use serde::{Deserialize, Serialize};

/// Inclusive bounds on the amount of a single investment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvestmentBounds {
    pub min: f64,
    pub max: f64,
}

impl InvestmentBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, ValidationError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if min <= 0.0 {
            return Err(ValidationError::InvalidBounds(
                "minimum investment must be positive".to_string(),
            ));
        }
        if max < min {
            return Err(ValidationError::InvalidBounds(format!(
                "maximum investment ({}) must not be below minimum ({})",
                max, min
            )));
        }
        Ok(Self { min, max })
    }

    pub fn check(&self, amount: f64) -> Result<(), FieldViolation> {
        if !amount.is_finite() {
            return Err(FieldViolation::new("amount", "must be a finite number"));
        }
        if amount < self.min {
            return Err(FieldViolation::new(
                "amount",
                format!("minimum investment is {:.2}", self.min),
            ));
        }
        if amount > self.max {
            return Err(FieldViolation::new(
                "amount",
                format!("maximum investment is {:.2}", self.max),
            ));
        }
        Ok(())
    }
}

impl Default for InvestmentBounds {
    fn default() -> Self {
        Self {
            min: 100.0,
            max: 10_000_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let bounds = InvestmentBounds::default();
        assert!(bounds.check(100.0).is_ok());
        assert!(bounds.check(10_000_000.0).is_ok());
        assert!(bounds.check(99.99).is_err());
        assert!(bounds.check(10_000_000.01).is_err());
    }

    #[test]
    fn test_check_nan() {
        let err = InvestmentBounds::default().check(f64::NAN).unwrap_err();
        assert_eq!(err.field, "amount");
    }

    #[test]
    fn test_new_rejects_inverted() {
        assert!(matches!(
            InvestmentBounds::new(500.0, 100.0),
            Err(ValidationError::InvalidBounds(_))
        ));
        assert!(matches!(
            InvestmentBounds::new(0.0, 100.0),
            Err(ValidationError::InvalidBounds(_))
        ));
        assert_eq!(
            InvestmentBounds::new(f64::INFINITY, 100.0),
            Err(ValidationError::MustBeFinite)
        );
        assert!(InvestmentBounds::new(50.0, 50.0).is_ok());
    }
}
