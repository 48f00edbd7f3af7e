// Public modules
pub mod context;
pub mod error;
pub mod executor;
pub mod goal;
pub mod logs;
pub mod manifest;
pub mod output;
pub mod permalink;
pub mod process;
pub mod progress;
pub mod stack;
pub mod transform;
pub mod tree;

// Public modules for CLI access
pub mod defaults;
pub mod paths;

// Re-export common types for convenience
pub use context::{EnvironmentTag, ExecutionContext, RepoRef};
pub use error::{Error, ErrorCode, Result};
pub use executor::PipelineExecutor;
pub use output::{ExternalUrl, PipelineFailure, PipelineResult, ResultPayload};
