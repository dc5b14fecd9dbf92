pub mod classifier;
pub mod config;
pub mod error;
pub mod explanation;
pub mod handlers;
pub mod labels;
pub mod models;
pub mod startup;
pub mod telemetry;
pub mod validation;
