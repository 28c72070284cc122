use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий интерфейс ошибок livecast.
///
/// Object-safe, поэтому ошибку любого слоя можно хранить как
/// `dyn ErrorExt` внутри [`crate::StackError`].
pub trait ErrorExt: Error + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    fn as_any(&self) -> &dyn Any;

    /// Текст для строки `-ERR`. Внутренние ошибки наружу не раскрываются.
    fn client_message(&self) -> String {
        if self.status_code() == StatusCode::Internal {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Поля для structured logging: короткое имя типа и код.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let type_name = std::any::type_name::<Self>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        vec![
            ("error_type", short.to_string()),
            ("status_code", self.status_code().code().to_string()),
        ]
    }
}
