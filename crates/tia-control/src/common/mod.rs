//! Terminal colors and tracing setup for the binary.

mod color;
pub mod telemetry;

pub use color::Colors;
pub use color::init as color_init;
pub use telemetry::TelemetryGuard;
pub use telemetry::init_tracing;
