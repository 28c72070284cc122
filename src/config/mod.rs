//! Загрузка конфигурации процесса.

pub mod settings;

pub use settings::{
    PubSubSettings, ServerSettings, Settings, DEFAULT_CONFIG_NAME, ENV_PREFIX, ENV_SEPARATOR,
};
