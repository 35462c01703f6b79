//! Watcher configuration.
//!
//! - `settings`: the serde structs read from TOML, with defaults
//! - `loader`: file loading, environment overrides and validation

mod loader;
mod settings;

pub use loader::{load_from_env, ResolvedConfig, CONFIG_PATH_ENV};
pub use settings::{
    ContractsConfig, MailConfig, MonitorConfig, NetworkConfig, NodesConfig, TelegramConfig,
    WalletsConfig, WatcherConfig,
};
