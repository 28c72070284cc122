use std::{net::SocketAddr, path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    logging::LoggingConfig,
    pubsub::{DeliveryPolicy, OverflowPolicy},
    ConfigError,
};

/// Префикс переменных окружения: `LIVECAST__SERVER__LISTEN_ADDRESS` и т.д.
pub const ENV_PREFIX: &str = "LIVECAST";
/// Разделитель вложенных ключей в переменных окружения.
pub const ENV_SEPARATOR: &str = "__";
/// Файл конфигурации по умолчанию (`livecast.toml`, `livecast.json`, ...),
/// необязательный.
pub const DEFAULT_CONFIG_NAME: &str = "livecast";

/// Настройки TCP-сервера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_address: String,
    pub max_connections: usize,
    /// Таймаут чтения команды в командном режиме
    pub read_timeout_secs: u64,
    /// Таймаут записи одного ответа или события
    pub write_timeout_ms: u64,
    /// Сколько ждать закрытия соединений при остановке
    pub shutdown_timeout_secs: u64,
}

/// Настройки доставки событий подписчикам.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubSettings {
    /// Ёмкость буфера подписки
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// Неограниченный буфер; `capacity` и `overflow` игнорируются
    pub unbounded: bool,
}

/// Конфигурация процесса.
///
/// Источники в порядке приоритета: переменные окружения `LIVECAST__*`,
/// файл конфигурации, значения по умолчанию.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub pubsub: PubSubSettings,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, необязательный
    /// `livecast.*` в текущем каталоге, окружение.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name(DEFAULT_CONFIG_NAME).required(false))
    }

    /// То же, но файл конфигурации обязателен.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = Config::try_from(&Settings::default()).map_err(load_error)?;
        let cfg = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(load_error)?;

        let settings: Settings = cfg.try_deserialize().map_err(load_error)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if self.server.max_connections == 0 {
            return Err(ConfigError::invalid(
                "server.max_connections",
                "must be greater than zero",
            ));
        }
        if self.server.read_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "server.read_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.server.write_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.write_timeout_ms",
                "must be greater than zero",
            ));
        }
        if !self.pubsub.unbounded && self.pubsub.capacity == 0 {
            return Err(ConfigError::invalid(
                "pubsub.capacity",
                "must be greater than zero for a bounded buffer",
            ));
        }
        self.logging.validate()
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address.parse().map_err(|e| {
            ConfigError::invalid(
                "server.listen_address",
                format!("'{}': {e}", self.listen_address),
            )
        })
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl PubSubSettings {
    pub fn delivery_policy(&self) -> DeliveryPolicy {
        if self.unbounded {
            DeliveryPolicy::Unbounded
        } else {
            DeliveryPolicy::bounded(self.capacity, self.overflow)
        }
    }
}

fn load_error(err: config::ConfigError) -> ConfigError {
    ConfigError::Load {
        reason: err.to_string(),
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:7070".to_string(),
            max_connections: 1024,
            read_timeout_secs: 300,
            write_timeout_ms: 5_000,
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for PubSubSettings {
    fn default() -> Self {
        Self {
            capacity: DeliveryPolicy::DEFAULT_CAPACITY,
            overflow: OverflowPolicy::default(),
            unbounded: false,
        }
    }
}
