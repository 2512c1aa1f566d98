mod loader;
mod root;
mod telemetry;
mod timeout;

pub use loader::load_from_path;
pub use root::{Config, Mode};
pub use telemetry::TelemetryConfig;
pub use timeout::TimeoutConfig;
