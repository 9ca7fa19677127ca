//! Error types shared across the sampling core

use thiserror_no_std::Error;

/// Construction-time failures. These are fatal: a session never starts
/// with an invalid configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Reporting interval must be at least one second")]
    ZeroInterval,
    #[error("Blade count must be non-zero")]
    ZeroBlades,
    #[error("Invalid 7-bit I2C address {0:#04x}")]
    InvalidAddress(u8),
    #[error("Publish channel identifier or write key missing")]
    MissingCredentials,
    #[error("Publish topic does not fit in {0} bytes")]
    TopicTooLong(usize),
    #[error("Failed to attach {0}")]
    Attach(&'static str),
}

/// Transient acquisition failures. The affected interval is skipped and the
/// session carries on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out during {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// Failure of a single reporting destination.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("Formatted output does not fit the line buffer")]
    LineOverflow,
    #[error("{destination}: write failed")]
    Write { destination: &'static str },
    #[error("{destination}: connection failed")]
    Connect { destination: &'static str },
    #[error("{destination}: timed out")]
    Timeout { destination: &'static str },
    #[error("Display draw failed")]
    Draw,
}
