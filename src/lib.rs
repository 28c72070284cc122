/// Server configuration loading (defaults, file, environment).
pub mod config;
/// Error types: status codes, context chains, domain errors.
pub mod error;
/// Structured logging (filters, formats, console and file sinks).
pub mod logging;
/// Line-protocol TCP adapter.
pub mod network;
/// Pub/Sub: topic registry, subscriptions, broadcaster.
pub mod pubsub;
/// Mutation entry points with post-commit broadcast.
pub mod service;
/// Subscription sessions and event sinks.
pub mod session;
/// External record store abstraction and in-memory implementation.
pub mod store;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Configuration.
pub use config::{PubSubSettings, ServerSettings, Settings};
/// Error types and helpers.
pub use error::{
    ConfigError, DeliveryError, ErrorExt, LogLevel, NetworkError, ParseError, SessionError,
    StackError, StatusCode, StoreError, TryRecvError,
};
/// Logging.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Network server.
pub use network::{run_tcp_server, AppState};
/// Pub/Sub API.
pub use pubsub::{
    Broadcaster, CancelHandle, Change, CommitHook, DeliveryPolicy, Event, EventPayload,
    OverflowPolicy, PublishReport, RegistryStats, Subscription, SubscriptionId, TopicRegistry,
    ENTITY_CREATED, ENTITY_LOCATION_UPDATED,
};
/// Mutation entry points.
pub use service::VehicleService;
/// Sessions.
pub use session::{
    CloseReason, EventSink, JsonLinesSink, SessionState, SessionSummary, SubscriptionSession,
};
/// Record store.
pub use store::{Coordinates, InMemoryStore, NewReview, NewVehicle, RecordStore, Review, Vehicle};
