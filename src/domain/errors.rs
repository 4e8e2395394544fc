use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single rejected field in a validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Coarse classification of a [`DomainError`], stable across messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    Validation,
    Forbidden,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        DomainError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::InvalidState(_) => ErrorKind::InvalidState,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Field violations carried by a validation failure, empty otherwise
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            DomainError::Validation(v) => v,
            _ => &[],
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Accumulates field violations so that every problem with an input is
/// reported at once instead of one per round trip.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldViolation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.0.push(FieldViolation::new(field, message));
        }
    }

    pub fn require_id(&mut self, value: &str, field: &str) {
        self.check(!value.trim().is_empty(), field, "is required");
    }

    pub fn push(&mut self, violation: FieldViolation) {
        self.0.push(violation);
    }

    pub fn into_result(self) -> DomainResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.0))
        }
    }
}

/// Low-level value errors raised by value objects
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Value must be finite")]
    MustBeFinite,

    #[error("{0}")]
    InvalidBounds(String),
}

impl ValidationError {
    /// Attach the offending field name
    pub fn at(self, field: &str) -> FieldViolation {
        FieldViolation::new(field, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            DomainError::not_found("Business", "b-1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            DomainError::InvalidState("x".into()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(DomainError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            DomainError::invalid_field("amount", "too small").kind(),
            ErrorKind::Validation
        );
        assert_eq!(DomainError::Forbidden("x".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(DomainError::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_not_found_message() {
        let err = DomainError::not_found("Investment", "inv-42");
        assert_eq!(err.to_string(), "Investment not found: inv-42");
    }

    #[test]
    fn test_violations_accumulate() {
        let mut v = Violations::new();
        v.check(false, "revenue", "must be non-negative");
        v.require_id("  ", "business_id");
        v.check(true, "expenses", "never reported");

        let err = v.into_result().unwrap_err();
        assert_eq!(err.violations().len(), 2);
        assert_eq!(err.violations()[0].field, "revenue");
        assert_eq!(err.violations()[1].field, "business_id");
        assert!(err.to_string().contains("revenue: must be non-negative"));
    }

    #[test]
    fn test_empty_violations_is_ok() {
        assert!(Violations::new().into_result().is_ok());
    }

    #[test]
    fn test_validation_error_at_field() {
        let violation = ValidationError::MustBeNonNegative.at("amount");
        assert_eq!(violation.field, "amount");
        assert_eq!(violation.message, "Value must be non-negative");
    }

    #[test]
    fn test_non_validation_has_no_violations() {
        assert!(DomainError::Conflict("dup".into()).violations().is_empty());
    }
}
