//! FundingPlatform - wires the pipeline managers onto one store and notifier

use crate::config::{ConfigError, PlatformConfig};
use crate::domain::repositories::ledger_store::LedgerStore;
use crate::domain::repositories::notifier::Notifier;
use crate::domain::services::distribution_engine::DistributionEngine;
use crate::domain::services::investment_lifecycle::InvestmentLifecycleManager;
use crate::domain::services::performance_workflow::PerformanceWorkflowManager;
use crate::domain::services::reporting::ReportingService;
use std::sync::Arc;
use tracing::info;

/// Entry point bundling every pipeline component.
///
/// All managers share the same `LedgerStore`, so the atomic commits they
/// issue are serialized by that single store.
#[derive(Clone)]
pub struct FundingPlatform {
    pub investments: Arc<InvestmentLifecycleManager>,
    pub performance: Arc<PerformanceWorkflowManager>,
    pub distributions: Arc<DistributionEngine>,
    pub reporting: Arc<ReportingService>,
    pub default_currency: String,
}

impl FundingPlatform {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn Notifier>,
        config: &PlatformConfig,
    ) -> Result<Self, ConfigError> {
        let bounds = config.investment_bounds()?;
        let distributions = Arc::new(DistributionEngine::new(store.clone(), notifier));
        let platform = Self {
            investments: Arc::new(InvestmentLifecycleManager::new(
                store.clone(),
                bounds,
                config.settlement_max_retries,
            )),
            performance: Arc::new(PerformanceWorkflowManager::new(
                store.clone(),
                distributions.clone(),
                config.settlement_max_retries,
            )),
            distributions,
            reporting: Arc::new(ReportingService::new(store)),
            default_currency: config.default_currency.clone(),
        };
        info!(
            "Funding platform ready: investments {:.2}..={:.2} {}, {} commit retries",
            bounds.min, bounds.max, config.default_currency, config.settlement_max_retries
        );
        Ok(platform)
    }
}
