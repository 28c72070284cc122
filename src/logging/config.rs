use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Переменная окружения с директивой фильтра, приоритетнее `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "LIVECAST_LOG";

/// Формат вывода логов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

/// Настройки вывода в консоль.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки файлового вывода с ежедневной ротацией.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Префикс имени файла; к нему добавляется дата
    pub filename: String,
    pub format: LogFormat,
}

/// Конфигурация подсистемы логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень или директива `EnvFilter`, например `info` или
    /// `livecast=debug,warn`
    pub level: String,
    pub format: LogFormat,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl LoggingConfig {
    /// Директива фильтра из конфигурации.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            // Свой крейт на выбранном уровне, зависимости не громче `warn`.
            format!("livecast={level},warn")
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.trim();
        if level.is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        let is_plain_level = tracing::Level::from_str(level).is_ok() || level == "off";
        let is_directive = level.contains('=') || level.contains(',');
        if !is_plain_level && !is_directive {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{level}'"),
            ));
        }
        if self.file.enabled && self.file.filename.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logging.file.filename",
                "must not be empty when file logging is enabled",
            ));
        }
        Ok(())
    }

    /// Создаёт каталог для файлового вывода, если он включён.
    pub fn ensure_log_dir(&self) -> Result<(), ConfigError> {
        if self.file.enabled {
            std::fs::create_dir_all(&self.file.directory)?;
        }
        Ok(())
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("logs"),
            filename: "livecast.log".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_level_directive() {
        let cfg = LoggingConfig {
            level: "debug".into(),
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "livecast=debug,warn");
    }

    #[test]
    fn test_full_directive_passes_through() {
        let cfg = LoggingConfig {
            level: "livecast::session=trace,info".into(),
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "livecast::session=trace,info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let cfg = LoggingConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"level":"warn","format":"json"}"#).unwrap();
        assert_eq!(cfg.level, "warn");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(cfg.console.enabled);
        assert!(!cfg.file.enabled);
    }

    #[test]
    fn test_ensure_log_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let cfg = LoggingConfig {
            file: FileConfig {
                enabled: true,
                directory: dir.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.ensure_log_dir().unwrap();
        assert!(dir.is_dir());
    }
}
