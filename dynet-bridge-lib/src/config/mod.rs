pub mod loader;
pub mod types;

pub use loader::{load_from_path, validate_config};
pub use types::{
    ActiveMode, AreaConfig, AreaKind, ChannelConfig, Config, Defaults, LogFormat, LoggingConfig,
    PresetConfig,
};
