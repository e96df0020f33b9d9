pub mod auto_refresh;
pub mod color;
pub mod config;
pub mod display;
pub mod error;
pub mod sampler;
pub mod schedule;
pub mod session;
pub mod strategy;
