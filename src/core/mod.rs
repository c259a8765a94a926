//! 核心编排层：错误类型、优雅关闭与系统装配

pub mod error;
pub mod orchestrator;
pub mod shutdown;

pub use error::AgentError;
pub use orchestrator::{run_rescue_system, troubleshooting_hints, SystemOutcome};
pub use shutdown::{run_with_graceful_shutdown, ShutdownManager, ShutdownReason};
