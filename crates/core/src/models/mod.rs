pub mod holding;
pub mod portfolio;
pub mod quote;
pub mod rebalance;
pub mod refresh;
pub mod settings;
