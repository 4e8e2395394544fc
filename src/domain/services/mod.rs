pub mod allocation;
pub mod distribution_engine;
pub mod ids;
pub mod investment_lifecycle;
pub mod performance_workflow;
pub mod reporting;
