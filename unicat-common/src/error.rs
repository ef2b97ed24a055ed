//! Common error types for UniCat exchanges

use thiserror::Error;
use uuid::Uuid;

/// Common result type for UniCat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the core and the exchange service
///
/// The first group are domain outcomes the request layer turns into
/// user-facing messages. None of them are fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
    /// User already has an enrollment (in this or any other program)
    #[error("User {user} is already connected to an exchange program")]
    AlreadyEnrolled { user: Uuid },

    /// User has no enrollment in the program they tried to review
    #[error("User {user} must be connected to program {program_id} to review it")]
    NotEnrolled { user: Uuid, program_id: i64 },

    /// User already reviewed this program
    #[error("User {user} has already reviewed program {program_id}")]
    AlreadyReviewed { user: Uuid, program_id: i64 },

    /// Exchange program does not exist
    #[error("Exchange program not found: {0}")]
    ProgramNotFound(i64),

    /// User does not exist
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// Account is not allowed to use the exchange directory
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error is a storage-level UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation())
    }
}
