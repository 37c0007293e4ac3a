//! Result and error types for the core library

use thiserror::Error;

/// Server error codes that mean "the object is already in the target state".
///
/// - 1022: duplicate key (older servers report duplicate FK names this way)
/// - 1050: table already exists
/// - 1060: duplicate column name
/// - 1061: duplicate key name
/// - 1091: can't drop column/key, it does not exist
/// - 1826: duplicate foreign key constraint name
pub const ALREADY_EXISTS_CODES: &[u16] = &[1022, 1050, 1060, 1061, 1091, 1826];

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("MySQL error {code}: {message}")]
    Server { code: u16, message: String },

    #[error("Consistency check failed: {0}")]
    Consistency(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Aborted by operator")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Server error code, if this came back from the MySQL server
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for benign DDL errors: duplicate column/index/constraint/table,
    /// or dropping something that is already gone.
    pub fn is_already_exists(&self) -> bool {
        self.server_code()
            .is_some_and(|code| ALREADY_EXISTS_CODES.contains(&code))
    }
}

impl From<mysql_async::Error> for Error {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Server(server) => Self::Server {
                code: server.code,
                message: server.message,
            },
            mysql_async::Error::Url(e) => Self::Config(format!("invalid DSN: {}", e)),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
