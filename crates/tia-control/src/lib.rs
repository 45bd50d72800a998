#![deny(clippy::all)]

pub mod calibration;
pub mod commands;
pub mod common;
pub mod config;
pub mod experiment;
pub mod handlers;
pub mod presenter;

pub use calibration::CalibrationError;
pub use config::ConfigError;
pub use config::ControlConfig;
pub use experiment::SubmitError;
