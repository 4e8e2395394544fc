pub mod investment_bounds;
pub mod money;
pub mod period;
