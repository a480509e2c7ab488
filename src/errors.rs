use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Access grant could not be issued (bad key, signing failure)
    CredentialError(String),
    /// Remote object enumeration failed (network, auth, bad container)
    ListError(String),
    /// A single object failed to download
    TransferError(String),
    /// Archive is unreadable or corrupt
    ArchiveFormatError(String),
    /// Archive extraction failed for filesystem reasons
    ArchiveIoError(String),
    /// Post-success deletion of a consumed archive failed
    CleanupError(String),
    /// An execution unit terminated abnormally
    JobError(String),
    /// Database connection or query failed
    DbError(String),
    /// Required configuration is missing or invalid
    ConfigError(String),
    /// IO operation failed
    IoError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::CredentialError(msg) => write!(f, "Credential error: {msg}"),
            AppError::ListError(msg) => write!(f, "Listing error: {msg}"),
            AppError::TransferError(msg) => write!(f, "Transfer error: {msg}"),
            AppError::ArchiveFormatError(msg) => write!(f, "Archive format error: {msg}"),
            AppError::ArchiveIoError(msg) => write!(f, "Archive IO error: {msg}"),
            AppError::CleanupError(msg) => write!(f, "Cleanup error: {msg}"),
            AppError::JobError(msg) => write!(f, "Job error: {msg}"),
            AppError::DbError(msg) => write!(f, "Database error: {msg}"),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            AppError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

// Conversion implementations for common errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::CredentialError(format!("Invalid container URL: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DbError(err.to_string())
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        AppError::ListError(format!("Malformed listing response: {err}"))
    }
}

// Custom type alias for Results in this application
pub type AppResult<T> = Result<T, AppError>;
