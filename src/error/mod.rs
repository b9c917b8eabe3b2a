use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Linkography error: {0}")]
    Linkography(#[from] LinkographError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output collision: {path} already holds session {existing} from this run")]
    OutputCollision { path: String, existing: String },
}

/// Errors that are fatal to a single session's analysis.
#[derive(Debug, Error)]
pub enum LinkographError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Embedding failure: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Configuration error: {field} - {reason}")]
    Configuration { field: String, reason: String },

    #[error("Analysis task cancelled: {message}")]
    Cancelled { message: String },

    #[error("Analysis task panicked: {message}")]
    TaskPanicked { message: String },
}

/// Malformed move input
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Session contains no moves")]
    EmptySession,

    #[error("Move {move_id} has empty content")]
    EmptyContent { move_id: String },

    #[error("Move id is empty at index {index}")]
    EmptyMoveId { index: usize },

    #[error("Duplicate move id: {move_id}")]
    DuplicateMoveId { move_id: String },

    #[error("Move {move_id} belongs to session {found}, expected {expected}")]
    SessionMismatch {
        move_id: String,
        expected: String,
        found: String,
    },

    #[error("Non-monotonic timestamp at move {move_id} (index {index})")]
    NonMonotonicTimestamp { move_id: String, index: usize },

    #[error("Unknown design phase: {value}")]
    UnknownPhase { value: String },

    #[error("Unknown move type: {value}")]
    UnknownMoveType { value: String },
}

/// Embedding collaborator failures
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding provider failed: {message}")]
    Provider { message: String },

    #[error("Embedding dimension mismatch for move {move_id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        move_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Embedding for move {move_id} contains non-finite values")]
    NonFinite { move_id: String },

    #[error("Embedding for move {move_id} has zero norm")]
    ZeroVector { move_id: String },

    #[error("Embedding request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Embedding service unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LinkographError {
    /// Build a configuration error for a named field.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LinkographError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for a single session's analysis
pub type LinkographResult<T> = Result<T, LinkographError>;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
