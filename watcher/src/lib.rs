pub mod app;
pub mod config;
pub mod messages;
pub mod notifier;
pub mod orchestrator;
pub mod state_store;
pub mod status_provider;

pub use config::{Cli, ConfigError, FailurePolicy, WatcherConfig};
pub use orchestrator::{RunReport, run_check};
pub use state_store::StateStore;
