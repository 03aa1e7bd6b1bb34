pub mod errors;
pub mod id;
pub mod notifications;
pub mod types;

pub use errors::{ConfigError, LosError, PlatformError};
pub use id::{MessageId, QueryId, ScalarId, UserId};
pub use notifications::{Toast, ToastLevel, ToastQueue, ToastSink};
pub use types::{QueryCounts, QueryThread, StatusCounts, ThreadMessage, User, STATUS_CLOSED};

pub type Result<T> = std::result::Result<T, LosError>;
