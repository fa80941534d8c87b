//! # Gaze Relay Core Library
//!
//! This crate is the core of the `gaze_relay` service: it ingests the
//! continuous text telemetry stream of a Gazepoint eye tracker over TCP,
//! frames it into fixed-length records, and makes the most recent record
//! available to consumers, either directly via latest-value queries or by
//! re-broadcasting the raw stream to any number of downstream TCP clients.
//! Organizing the project as a library keeps the service binary (`main.rs`)
//! thin and lets visualization or logging frontends embed the same core.
//!
//! ## Crate Structure
//!
//! - **`config`**: Structures for loading and validating application
//!   configuration from TOML files. See [`config::Settings`].
//! - **`error`**: The custom [`error::GazeError`] enum for centralized error
//!   handling across the application.
//! - **`frame`**: Positional framing of the byte stream.
//!   [`frame::FrameScanner`] turns arbitrarily chunked reads into complete
//!   fixed-length records.
//! - **`logging`**: `tracing` subscriber setup for the binary.
//! - **`reader`**: [`reader::TrackerReader`], which owns the upstream
//!   connection, runs the receive loop, and exposes the latest decoded
//!   sample.
//! - **`relay`**: [`relay::RelayServer`], which fans the raw stream out to
//!   every connected downstream client with per-client failure isolation.
//! - **`sample`**: Pure record decoding ([`sample::extract_fields`]) and
//!   normalized-to-pixel coordinate mapping ([`sample::ScreenMap`]).

pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod reader;
pub mod relay;
pub mod sample;

pub use config::Settings;
pub use error::{AppResult, GazeError};
pub use frame::{FrameScanner, FrameSpec};
pub use reader::{ReaderState, TrackerReader};
pub use relay::RelayServer;
pub use sample::{extract_fields, GazeSample, ScreenMap};
