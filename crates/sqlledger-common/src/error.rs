use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("execution error in {identifier}: {message}")]
    Execution { identifier: String, message: String },

    #[error("bookkeeping error for {identifier}: {message}")]
    Bookkeeping { identifier: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], so callers can branch on the kind
/// of failure without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The engine could not be set up; no run is possible.
    Configuration,
    /// Pending work could not be determined; nothing was mutated.
    Discovery,
    /// A migration unit failed to load or execute; the run was rolled back.
    Execution,
    /// A unit executed but could not be recorded; the run was rolled back.
    Bookkeeping,
}

impl Error {
    pub fn execution(identifier: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Execution {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }

    pub fn bookkeeping(identifier: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Bookkeeping {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Configuration,
            Error::Discovery(_) | Error::Io(_) => ErrorCategory::Discovery,
            Error::Execution { .. } => ErrorCategory::Execution,
            Error::Bookkeeping { .. } => ErrorCategory::Bookkeeping,
        }
    }

    /// Only discovery failures leave the database untouched and are worth
    /// retrying as-is. Execution and bookkeeping failures need a fix first.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Discovery
    }

    /// The migration identifier involved, if the failure is tied to one unit.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Error::Execution { identifier, .. } | Error::Bookkeeping { identifier, .. } => {
                Some(identifier)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Discovery => "discovery",
            ErrorCategory::Execution => "execution",
            ErrorCategory::Bookkeeping => "bookkeeping",
        };
        f.write_str(name)
    }
}
