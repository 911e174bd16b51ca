pub mod dashboard;
pub mod intelligence;
pub mod service;
pub mod ticker;
pub mod types;

pub use service::MarketDataService;
