use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    ShapeMismatch { expected: usize, actual: usize },
    OutOfBounds,
    MissingChannel(String),
    MissingKey { section: String, key: String },
    InvalidValue { key: String, value: String },
    Consistency(String),
    Io(String),
    Serde(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch: expected {expected} elements, got {actual}")
            }
            Self::OutOfBounds => write!(f, "out of bounds"),
            Self::MissingChannel(name) => write!(f, "missing channel: {name}"),
            Self::MissingKey { section, key } => {
                write!(f, "missing config key: [{section}] {key}")
            }
            Self::InvalidValue { key, value } => {
                write!(f, "invalid config value for {key}: {value:?}")
            }
            Self::Consistency(msg) => write!(f, "consistency error: {msg}"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Serde(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
