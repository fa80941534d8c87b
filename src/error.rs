//! Custom error types for the application.
//!
//! This module defines the primary error type, `GazeError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur,
//! from configuration and I/O issues to malformed tracker records.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from the `config` crate, typically related to
//!   file parsing or format issues in the configuration files.
//! - **`Configuration`**: Semantic errors in the configuration, values that
//!   parse fine but are logically invalid (zero frame length, empty marker).
//!   These are caught during the validation step.
//! - **`Io`**: Wraps standard `std::io::Error`, covering all network I/O.
//! - **`Connection`**: The upstream tracker could not be reached, or the
//!   initialization command sequence could not be written. Reported to the
//!   caller; the library never retries internally.
//! - **`Bind`**: The relay's listening socket could not be bound. Fatal to
//!   relay startup; the caller must pick a different port or abort.
//! - **`MalformedRecord`**: A framed record contained no recognizable
//!   `NAME="VALUE"` fields at all. Individual bad frames are dropped by the
//!   receive loop and never crash the reader.
//! - **`Range`**: A normalized gaze coordinate fell outside `[0, 1]`.
//!   Surfaced to the caller, never silently clamped.
//! - **`MissingField`**: A record parsed but lacked a field the caller
//!   requires (e.g. `FPOGX` for pixel mapping).
//!
//! By using `#[from]`, `GazeError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the application with
//! the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, GazeError>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum GazeError {
    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The upstream tracker could not be reached or initialized.
    #[error("Tracker connection error: {0}")]
    Connection(String),

    /// The relay could not bind its listening socket.
    #[error("Failed to bind relay listener on {addr}: {source}")]
    Bind {
        /// The address the bind was attempted on.
        addr: String,
        /// The underlying socket error.
        source: std::io::Error,
    },

    /// A record yielded no recognizable `NAME="VALUE"` fields.
    #[error("Malformed record: no recognizable fields")]
    MalformedRecord,

    /// A normalized coordinate was outside the `[0, 1]` range.
    #[error("Gaze coordinates must be within [0, 1], got x={x}, y={y}")]
    Range {
        /// The offending x coordinate.
        x: f64,
        /// The offending y coordinate.
        y: f64,
    },

    /// A record parsed but a required field was absent.
    #[error("Record is missing required field {0}")]
    MissingField(&'static str),
}
