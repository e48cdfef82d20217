//! Configuration module for colscout.
//!
//! Handles source database connections, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver};
pub use settings::{
    expand_env_vars, DatabaseSettings, DiscoverySettings, RankingSettings, Settings,
    SettingsError, StorageSettings, TrainingSettings,
};
