//! Centralized error types for the AGS core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Separates load-time configuration errors from runtime command failures
//! - Exposes machine-readable codes through [`ErrorCode`]

use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for diagnostics and logs.
    fn code(&self) -> &'static str;
}

/// Invalid topology, source catalog or settings.
///
/// Always fatal at load time: a configuration that fails validation is
/// rejected before the first resolution cycle runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("room name must not be empty")]
    EmptyRoomName,

    #[error("room '{0}' is configured more than once")]
    DuplicateRoom(String),

    #[error("device in room '{room}' has an empty device id")]
    EmptyDeviceId { room: String },

    #[error("device '{0}' is configured more than once")]
    DuplicateDevice(String),

    #[error("source name must not be empty")]
    EmptySourceName,

    #[error("source '{0}' is configured more than once")]
    DuplicateSource(String),

    /// A numeric or structural setting is out of range.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyRoomName => "empty_room_name",
            Self::DuplicateRoom(_) => "duplicate_room",
            Self::EmptyDeviceId { .. } => "empty_device_id",
            Self::DuplicateDevice(_) => "duplicate_device",
            Self::EmptySourceName => "empty_source_name",
            Self::DuplicateSource(_) => "duplicate_source",
            Self::InvalidSetting(_) => "invalid_setting",
        }
    }
}

/// Failure reported by a [`DeviceCommandSink`](crate::devices::DeviceCommandSink).
///
/// Command failures are never retried: the action queue logs them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The device (or its controller) refused the command.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The target device could not be reached.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ErrorCode for CommandError {
    fn code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "command_rejected",
            Self::Unreachable(_) => "device_unreachable",
            Self::Transport(_) => "transport_error",
        }
    }
}

/// Application-wide error type for AGS.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AgsError {
    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A control request named a room that is not configured.
    #[error("Unknown room: {0}")]
    UnknownRoom(String),

    /// A control request named a source that is not in the catalog.
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// A player request arrived while no speaker leads.
    #[error("No primary speaker")]
    NoPrimary,

    /// Volume outside `0.0..=1.0`.
    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    /// A device command failed.
    #[error("Command failed: {0}")]
    Command(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCode for AgsError {
    fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::UnknownRoom(_) => "unknown_room",
            Self::UnknownSource(_) => "unknown_source",
            Self::NoPrimary => "no_primary",
            Self::InvalidVolume(_) => "invalid_volume",
            Self::Command(_) => "command_failed",
            Self::Internal(_) => "internal_error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

/// Result of validating configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result of a single sink call.
pub type CommandResult<T> = Result<T, CommandError>;

/// Convenient Result alias for application-wide operations.
pub type AgsResult<T> = Result<T, AgsError>;

impl From<ConfigError> for AgsError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<CommandError> for AgsError {
    fn from(err: CommandError) -> Self {
        Self::Command(err.to_string())
    }
}
