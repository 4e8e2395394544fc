//! Quarterly reporting period

use crate::domain::errors::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MIN_REPORTING_YEAR: i32 = 2000;
pub const MAX_REPORTING_YEAR: i32 = 2100;

/// A (year, quarter) pair identifying one reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub year: i32,
    pub quarter: u8,
}

impl ReportingPeriod {
    pub fn new(year: i32, quarter: u8) -> Result<Self, ValidationError> {
        if !(1..=4).contains(&quarter) {
            return Err(ValidationError::InvalidPeriod(format!(
                "quarter must be between 1 and 4, got {}",
                quarter
            )));
        }
        if !(MIN_REPORTING_YEAR..=MAX_REPORTING_YEAR).contains(&year) {
            return Err(ValidationError::InvalidPeriod(format!(
                "year must be between {} and {}, got {}",
                MIN_REPORTING_YEAR, MAX_REPORTING_YEAR, year
            )));
        }
        Ok(Self { year, quarter })
    }

    /// The quarter immediately before this one; Q1 wraps to Q4 of the prior year
    pub fn previous(&self) -> ReportingPeriod {
        if self.quarter == 1 {
            ReportingPeriod {
                year: self.year - 1,
                quarter: 4,
            }
        } else {
            ReportingPeriod {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }

    fn first_month(&self) -> u32 {
        (self.quarter as u32 - 1) * 3 + 1
    }

    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.first_month(), 1).unwrap_or_default()
    }

    pub fn end_date(&self) -> NaiveDate {
        let next = if self.quarter == 4 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.first_month() + 3, 1)
        };
        next.and_then(|d| d.pred_opt()).unwrap_or_default()
    }
}

impl std::fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}
