//! Error types for the VoxPad coordination core.

use uuid::Uuid;

/// Result type alias for VoxPad operations
pub type VoxpadResult<T> = Result<T, VoxpadError>;

/// Main error type for VoxPad operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VoxpadError {
    /// TTS synthesis failed
    #[error("TTS synthesis failed: {message}")]
    SynthesisError {
        /// Error message describing the failure
        message: String,
    },

    /// Audio playback error
    #[error("Audio playback error: {message}")]
    PlaybackError {
        /// Error message describing the playback issue
        message: String,
    },

    /// Field identifier no longer resolves to an open project
    #[error("Field '{field_id}' not found")]
    FieldNotFound {
        /// The field identifier that was not found
        field_id: Uuid,
    },

    /// Project name not found among open projects
    #[error("Project '{name}' not found")]
    ProjectNotFound {
        /// The project name that was not found
        name: String,
    },

    /// Synthesis environment setup failed
    #[error("Setup error: {message}")]
    SetupError {
        /// Error message describing the setup failure
        message: String,
    },

    /// Project document or index persistence failed
    #[error("Persistence error: {message}")]
    PersistenceError {
        /// Error message describing the persistence failure
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out: {message}")]
    TimeoutError {
        /// Error message describing the timeout
        message: String,
    },

    /// Thread or concurrency error
    #[error("Concurrency error: {message}")]
    ConcurrencyError {
        /// Error message describing the concurrency issue
        message: String,
    },
}

impl VoxpadError {
    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create a new playback error
    #[must_use]
    pub fn playback<S: Into<String>>(message: S) -> Self {
        Self::PlaybackError {
            message: message.into(),
        }
    }

    /// Create a new field not found error
    #[must_use]
    pub const fn field_not_found(field_id: Uuid) -> Self {
        Self::FieldNotFound { field_id }
    }

    /// Create a new project not found error
    #[must_use]
    pub fn project_not_found<S: Into<String>>(name: S) -> Self {
        Self::ProjectNotFound { name: name.into() }
    }

    /// Create a new setup error
    #[must_use]
    pub fn setup<S: Into<String>>(message: S) -> Self {
        Self::SetupError {
            message: message.into(),
        }
    }

    /// Create a new persistence error
    #[must_use]
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::PersistenceError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    #[must_use]
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::TimeoutError {
            message: message.into(),
        }
    }

    /// Create a new concurrency error
    #[must_use]
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        Self::ConcurrencyError {
            message: message.into(),
        }
    }

    /// Check if this error is recovered locally by the component that hit it
    ///
    /// Resolution races, backend failures and missing players are logged and
    /// skipped; they never stop the worker loop or crash the process.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SynthesisError { .. }
                | Self::PlaybackError { .. }
                | Self::FieldNotFound { .. }
                | Self::ProjectNotFound { .. }
        )
    }

    /// Check if this error aborts startup of the synthesis feature
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SetupError { .. })
    }

    /// Check if this error is due to invalid user input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::ConfigurationError { .. }
        )
    }

    /// Get the error category for logging/metrics
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::SynthesisError { .. } => "synthesis",
            Self::PlaybackError { .. } => "playback",
            Self::FieldNotFound { .. } => "field",
            Self::ProjectNotFound { .. } => "project",
            Self::SetupError { .. } => "setup",
            Self::PersistenceError { .. } => "persistence",
            Self::FileError { .. } => "file",
            Self::InvalidInput { .. } => "input",
            Self::ConfigurationError { .. } => "configuration",
            Self::TimeoutError { .. } => "timeout",
            Self::ConcurrencyError { .. } => "concurrency",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for VoxpadError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for VoxpadError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::timeout(format!("Operation timed out: {err}"))
    }
}

impl From<serde_json::Error> for VoxpadError {
    fn from(err: serde_json::Error) -> Self {
        Self::persistence(format!("JSON serialization error: {err}"))
    }
}

impl From<toml::ser::Error> for VoxpadError {
    fn from(err: toml::ser::Error) -> Self {
        Self::persistence(format!("TOML serialization error: {err}"))
    }
}

impl From<toml::de::Error> for VoxpadError {
    fn from(err: toml::de::Error) -> Self {
        Self::persistence(format!("TOML deserialization error: {err}"))
    }
}

impl From<anyhow::Error> for VoxpadError {
    fn from(err: anyhow::Error) -> Self {
        Self::synthesis(err.to_string())
    }
}
