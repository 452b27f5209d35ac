//! # Observability Infrastructure
//!
//! Structured logging and operation metrics for the secret engine.

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, log_config_info, LogFormat};
pub use self::metrics::{describe_metrics, OperationMetrics};

/// Initialize logging and register metric descriptions.
pub fn init_observability(verbose: bool, format: LogFormat) {
    init_logging(verbose, format);
    describe_metrics();
}
