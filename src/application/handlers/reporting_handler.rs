use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::application::services::funding_platform::FundingPlatform;
use crate::domain::entities::distribution::{Distribution, DistributionStatus};
use crate::domain::errors::{DomainError, ErrorKind, FieldViolation};
use crate::domain::services::reporting::{
    BusinessPeriodTotals, DistributionStats, InvestmentStats, InvestorSummary,
};
use crate::domain::value_objects::period::ReportingPeriod;

/// Query parameters for distribution listings
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DistributionQuery {
    /// pending, approved, paid, failed or cancelled
    pub status: Option<String>,
    pub year: Option<i32>,
    pub quarter: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeriodQuery {
    pub year: i32,
    pub quarter: u8,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvestmentStatsQuery {
    pub business_id: Option<String>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(e: DomainError) -> ApiError {
    if e.kind() == ErrorKind::Internal {
        tracing::error!("Request failed: {}", e);
    }
    (
        status_for(e.kind()),
        Json(ErrorResponse {
            error: e.to_string(),
            kind: e.kind(),
            violations: e.violations().to_vec(),
        }),
    )
}

impl DistributionQuery {
    fn parse(&self) -> Result<(Option<DistributionStatus>, Option<ReportingPeriod>), DomainError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<DistributionStatus>)
            .transpose()
            .map_err(|e| DomainError::Validation(vec![e.at("status")]))?;
        let period = match (self.year, self.quarter) {
            (Some(year), Some(quarter)) => Some(
                ReportingPeriod::new(year, quarter)
                    .map_err(|e| DomainError::Validation(vec![e.at("period")]))?,
            ),
            (None, None) => None,
            _ => {
                return Err(DomainError::invalid_field(
                    "period",
                    "year and quarter must be given together",
                ))
            }
        };
        Ok((status, period))
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Distributions received by one investor
pub async fn get_investor_distributions(
    State(platform): State<FundingPlatform>,
    Path(investor_id): Path<String>,
    Query(params): Query<DistributionQuery>,
) -> ApiResult<Vec<Distribution>> {
    let (status, period) = params.parse().map_err(api_error)?;
    platform
        .reporting
        .list_investor_distributions(&investor_id, status, period)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn get_investor_summary(
    State(platform): State<FundingPlatform>,
    Path(investor_id): Path<String>,
) -> ApiResult<InvestorSummary> {
    platform
        .reporting
        .investor_summary(&investor_id)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Distributions issued by one business
pub async fn get_business_distributions(
    State(platform): State<FundingPlatform>,
    Path(business_id): Path<String>,
    Query(params): Query<DistributionQuery>,
) -> ApiResult<Vec<Distribution>> {
    let (status, period) = params.parse().map_err(api_error)?;
    platform
        .reporting
        .list_business_distributions(&business_id, status, period)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn get_business_period_totals(
    State(platform): State<FundingPlatform>,
    Path(business_id): Path<String>,
    Query(params): Query<PeriodQuery>,
) -> ApiResult<BusinessPeriodTotals> {
    let period = ReportingPeriod::new(params.year, params.quarter)
        .map_err(|e| api_error(DomainError::Validation(vec![e.at("period")])))?;
    platform
        .reporting
        .business_period_totals(&business_id, period)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn get_distribution_stats(
    State(platform): State<FundingPlatform>,
) -> ApiResult<DistributionStats> {
    platform
        .reporting
        .distribution_stats()
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn get_investment_stats(
    State(platform): State<FundingPlatform>,
    Query(params): Query<InvestmentStatsQuery>,
) -> ApiResult<InvestmentStats> {
    platform
        .reporting
        .investment_stats(params.business_id.as_deref())
        .await
        .map(Json)
        .map_err(api_error)
}

/// Read-only reporting API
pub fn router(platform: FundingPlatform) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/investors/:id/distributions", get(get_investor_distributions))
        .route("/investors/:id/summary", get(get_investor_summary))
        .route("/businesses/:id/distributions", get(get_business_distributions))
        .route("/businesses/:id/totals", get(get_business_period_totals))
        .route("/stats/distributions", get(get_distribution_stats))
        .route("/stats/investments", get(get_investment_stats))
        .with_state(platform)
}
