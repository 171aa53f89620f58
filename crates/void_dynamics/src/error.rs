//! Error types for the physics system
//!
//! The simulation itself never fails: missing handles resolve to `None`/`false`
//! and degenerate geometry falls back to safe defaults. Errors only surface
//! when loading or validating configuration.

use thiserror::Error;

/// Physics system errors
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed
    #[error("Failed to parse physics configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize physics configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
