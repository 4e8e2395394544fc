pub mod business;
pub mod caller;
pub mod distribution;
pub mod investment;
pub mod performance;
