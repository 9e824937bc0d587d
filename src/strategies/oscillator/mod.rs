//! Oscillator variant: multi-period RSI dip entry, fast-RSI cross exit

pub mod config;
pub mod strategy;

pub use config::OscillatorConfig;
pub use strategy::OscillatorStrategy;
