use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Empty collection")]
    EmptyCollection,

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid tolerance (must be finite and >= 0): {0}")]
    InvalidTolerance(f64),

    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth { row: usize, expected: usize, found: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

// Type alias for Result
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error conversions
impl Error {
    pub fn invalid_geometry<S: Into<String>>(msg: S) -> Self {
        Error::InvalidGeometry(msg.into())
    }

    pub fn unknown_crs<S: Into<String>>(msg: S) -> Self {
        Error::UnknownCrs(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::InternalInconsistency(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}
