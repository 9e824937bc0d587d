//! Grid variant: ladder entries in range-bound markets

pub mod config;
pub mod strategy;

pub use config::GridRangeConfig;
pub use strategy::GridRangeStrategy;
