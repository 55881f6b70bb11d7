//! Configuration.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, DatabaseSettings, ImportSettings, ResolverSettings, Settings,
    SettingsError,
};
