use thiserror::Error;

/// Error type returned by listeners.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Source of a `ListenerFailure` raised by a caught listener panic.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("listener panicked: {message}")]
pub struct ListenerPanic {
    pub message: String,
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Listener {position} ({label}) failed: {source}")]
    ListenerFailure {
        /// 1-based registration position of the failing listener
        position: usize,
        label: String,
        #[source]
        source: ListenerError,
    },

    #[error("Event already registered: {event_key}")]
    AlreadyRegistered { event_key: String },

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Event type mismatch: {event_key}, expected {expected}, got {got}")]
    TypeMismatch {
        event_key: String,
        expected: String,
        got: String,
    },

    #[error("Config error: {message}")]
    Config { message: String },
}

pub type EventResult<T> = Result<T, EventError>;

impl EventError {
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        EventError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Registration position of the listener that caused the error, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            EventError::ListenerFailure { position, .. } => Some(*position),
            _ => None,
        }
    }
}
