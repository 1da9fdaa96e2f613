use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the generation pipeline
#[derive(Debug)]
pub enum Error {
    /// A controller, type or source file could not be analysed. Recoverable:
    /// the affected route is still emitted with whatever could be recovered.
    Analysis { subject: String, message: String },
    /// Invalid or missing configuration, raised before anything is written.
    Configuration(String),
    /// The collection could not be written to disk.
    Persistence { path: PathBuf, message: String },
    /// Pushing the collection to the remote host failed. Never fatal.
    RemoteSync(String),
    IoError(std::io::Error),
    SerializationError(String),
}

impl Error {
    pub fn analysis(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Analysis {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Analysis { subject, message } => {
                write!(f, "Analysis error for {}: {}", subject, message)
            }
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::Persistence { path, message } => {
                write!(f, "Failed to persist {}: {}", path.display(), message)
            }
            Error::RemoteSync(msg) => write!(f, "Remote sync error: {}", msg),
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML serialization error: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteSync(err.to_string())
    }
}
