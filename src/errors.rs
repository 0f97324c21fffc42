//! Centralized error handling for PPEPost
//!
//! This module provides structured error types used across the crate,
//! enabling better error context than a generic `Box<dyn Error>`.

use std::fmt;

/// Main error type for PPEPost operations
#[derive(Debug)]
pub enum PpePostError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Variable not found in NetCDF file
    VariableNotFound { var: String },

    /// Dimension not found in array
    DimensionNotFound { var: String, dim: String },

    /// Coordinate label count does not match its dimension length
    CoordinateMismatch {
        dim: String,
        expected: usize,
        actual: usize,
    },

    /// Time axis could not be decoded from file metadata
    TimeDecodeError(String),

    /// Date outside the noleap calendar
    InvalidDate { year: i32, month: u32, day: u32 },

    /// Land-area weight validation failure
    WeightError(String),

    /// Batch scheduler interaction failure
    ClusterError(String),

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error
    Generic(String),
}

impl fmt::Display for PpePostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpePostError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            PpePostError::IoError(e) => write!(f, "I/O error: {}", e),
            PpePostError::ArrayError(e) => write!(f, "Array error: {}", e),
            PpePostError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            PpePostError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found in array '{}'", dim, var)
            }
            PpePostError::CoordinateMismatch {
                dim,
                expected,
                actual,
            } => write!(
                f,
                "Coordinate for dimension '{}' has {} labels, expected {}",
                dim, actual, expected
            ),
            PpePostError::TimeDecodeError(msg) => write!(f, "Time decoding error: {}", msg),
            PpePostError::InvalidDate { year, month, day } => {
                write!(f, "Invalid noleap date: {:04}-{:02}-{:02}", year, month, day)
            }
            PpePostError::WeightError(msg) => write!(f, "Land-area weight error: {}", msg),
            PpePostError::ClusterError(msg) => write!(f, "Cluster scheduler error: {}", msg),
            PpePostError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            PpePostError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PpePostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PpePostError::NetCDFError(e) => Some(e),
            PpePostError::IoError(e) => Some(e),
            PpePostError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for PpePostError {
    fn from(error: netcdf::Error) -> Self {
        PpePostError::NetCDFError(error)
    }
}

impl From<std::io::Error> for PpePostError {
    fn from(error: std::io::Error) -> Self {
        PpePostError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for PpePostError {
    fn from(error: ndarray::ShapeError) -> Self {
        PpePostError::ArrayError(error)
    }
}

impl From<String> for PpePostError {
    fn from(error: String) -> Self {
        PpePostError::Generic(error)
    }
}

impl From<&str> for PpePostError {
    fn from(error: &str) -> Self {
        PpePostError::Generic(error.to_string())
    }
}

/// Result type alias for PPEPost operations
pub type Result<T> = std::result::Result<T, PpePostError>;
