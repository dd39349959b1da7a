pub mod config;
pub mod naming;
pub mod settings;
pub mod types;

pub use config::RunnerConfig;
pub use naming::{
    containers, extract_task_id, log_stream_name, tags, task_definition_revision,
    validate_execution_id,
};
pub use settings::{ExecutionSettings, SETTINGS_STATE_KEY, Tags};
pub use types::*;
