//! Unified error types for the beakn core library.
//!
//! [`BeaknError`] covers every failure mode a caller of the region tracker can
//! observe. Configuration loading has its own [`ConfigError`](crate::config::ConfigError)
//! which converts into [`BeaknError`].
//!
//! # Design Principles
//!
//! - **Per-descriptor**: request failures are reported per beacon and never
//!   abort processing of sibling beacons in the same batch
//! - **Actionable messages**: error messages tell the caller what to fix
//! - **Non-fatal**: no variant leaves the tracker unusable
//! - **HTTP-ready**: error types expose HTTP status codes and error codes
//!
//! # Example
//!
//! ```rust
//! use beakn_core::error::{AuthorizationFailure, BeaknError, Result};
//!
//! fn require_services(enabled: bool) -> Result<()> {
//!     if !enabled {
//!         return Err(BeaknError::Authorization(AuthorizationFailure::ServicesDisabled));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_services(false).unwrap_err().is_authorization_error());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Why the platform refused to let the tracker monitor regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationFailure {
    /// Location services are switched off device-wide.
    ServicesDisabled,
    /// The user explicitly denied location access.
    Denied,
    /// Access is blocked by policy (parental controls, MDM).
    Restricted,
    /// Authorization is below the "always" level needed for region monitoring.
    NotAuthorized,
}

impl std::fmt::Display for AuthorizationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::ServicesDisabled => "Location services not enabled",
            Self::Denied => "User denied location services",
            Self::Restricted => "App is prevented from accessing location services",
            Self::NotAuthorized => "App doesn't have authorization to monitor regions",
        };
        f.write_str(message)
    }
}

/// The unified error type for all beakn operations.
#[derive(Debug, Error)]
pub enum BeaknError {
    // =========================================================================
    // REQUEST ERRORS
    // =========================================================================
    /// Location services are disabled or the app lacks "always" authorization.
    #[error("Authorization error: {0}")]
    Authorization(AuthorizationFailure),

    /// The region UUID could not be parsed.
    #[error("Invalid UUID string: '{0}'. Expected a UUID such as 'E2C56DB5-DFFB-48D2-B060-D0F5A71096E0'.")]
    InvalidUuidString(String),

    /// A minor value was supplied without a major value.
    #[error("Invalid beacon info for '{identifier}': a minor value requires a major value")]
    InvalidBeaknInfo {
        /// Identifier of the offending descriptor.
        identifier: String,
    },

    /// The platform cannot monitor this class of region.
    #[error("Region monitoring error: {0}")]
    RegionMonitoring(String),

    // =========================================================================
    // PLATFORM ERRORS
    // =========================================================================
    /// The platform beacon engine failed to start.
    #[error("Initialization error: {0}")]
    Initialization(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// Region tables could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A configuration file was missing, malformed or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A table could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized [`Result`] type for beakn operations.
pub type Result<T> = std::result::Result<T, BeaknError>;

impl BeaknError {
    /// Returns `true` if the caller passed malformed input.
    #[inline]
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUuidString(_) | Self::InvalidBeaknInfo { .. }
        )
    }

    /// Returns `true` if this error is an authorization refusal.
    #[inline]
    #[must_use]
    pub const fn is_authorization_error(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Io(_) | Self::Serialization(_)
        )
    }

    /// Returns `true` if retrying after user or operator action can succeed.
    ///
    /// Authorization can be granted by the user and persistence failures are
    /// usually transient; malformed input never succeeds on retry.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Authorization(_) | Self::Persistence(_) | Self::Io(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidUuidString(_) | Self::InvalidBeaknInfo { .. } => 400,

            // 403 Forbidden - platform refuses access
            Self::Authorization(_) => 403,

            // 422 Unprocessable Entity - region understood but not monitorable
            Self::RegionMonitoring(_) => 422,

            // 500 Internal Server Error
            Self::Persistence(_) | Self::Config(_) | Self::Io(_) | Self::Serialization(_) => 500,

            // 503 Service Unavailable - platform engine down
            Self::Initialization(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::InvalidUuidString(_) => "INVALID_UUID_STRING",
            Self::InvalidBeaknInfo { .. } => "INVALID_BEAKN_INFO",
            Self::RegionMonitoring(_) => "REGION_MONITORING_ERROR",
            Self::Initialization(_) => "INITIALIZATION_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<crate::config::ConfigError> for BeaknError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::ReadError { path, source } | ConfigError::WriteError { path, source } => {
                Self::Persistence(format!("{}: {source}", path.display()))
            }
            other => Self::Config(other.to_string()),
        }
    }
}
