//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. User config (~/.config/emr-spark-submit/config.toml)
//! 3. Config file given with `--config`
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    default_user_config_path, ClusterSettings, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    Settings, MAX_POLL_INTERVAL_SECS,
};
pub use merge::{deep_merge, merge_layers};
