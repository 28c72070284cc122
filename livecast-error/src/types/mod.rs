pub mod config;
pub mod pubsub;
pub mod session;
pub mod store;

// Публичный экспорт всех типов ошибок из вложенных модулей.
pub use config::*;
pub use pubsub::*;
pub use session::*;
pub use store::*;
