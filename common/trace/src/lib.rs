pub mod global_logging;

pub use global_logging::{init_default_global_tracing, init_global_logging};
pub use tracing::{debug, error, info, instrument, trace, warn};
pub use tracing_appender::non_blocking::WorkerGuard;
