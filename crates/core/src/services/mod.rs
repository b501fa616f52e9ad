pub mod fx_service;
pub mod portfolio_service;
pub mod quote_service;
pub mod rebalance_service;
pub mod refresh_service;
pub mod valuation_service;
