//! Error types surfaced by the report layer.

use thiserror::Error;

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Errors surfaced by [`crate::cache::ReportCache`] and [`crate::assistant::VehicleAssistant`].
///
/// None of these are retried inside the crate; retry is a caller decision.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Identifier was rejected before any store or generator access.
    #[error("invalid vehicle identifier: {reason}")]
    InvalidIdentifier { reason: String },

    /// The backing store could not be read or written.
    /// Never downgraded to a cache miss.
    #[error("report store unavailable (key '{key}'): {source}")]
    StoreUnavailable {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The generator failed or returned an empty report. Nothing was stored.
    #[error("report generation failed for '{identifier}': {source}")]
    GenerationFailed {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    /// No usable identifier could be extracted from an image.
    #[error("could not identify a vehicle from the image: {source}")]
    ResolverFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ReportError {
    pub fn invalid_identifier(reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            reason: reason.into(),
        }
    }

    /// True for outages of an external service, as opposed to bad input.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::GenerationFailed { .. }
        )
    }

    /// One-line message suitable for an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidIdentifier { reason } => format!("Please enter a vehicle: {}", reason),
            Self::StoreUnavailable { .. } => {
                "The report service is temporarily unavailable (storage). Please try again later."
                    .to_string()
            }
            Self::GenerationFailed { .. } => {
                "The report service is temporarily unavailable (generation). Please try again later."
                    .to_string()
            }
            Self::ResolverFailed { .. } => {
                "We could not recognise a vehicle in that picture. Try another photo or type the model."
                    .to_string()
            }
            Self::Config(e) => format!("Configuration problem: {}", e),
        }
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidIdentifier { .. } | Self::Config(_) => 2,
            Self::StoreUnavailable { .. } => 3,
            Self::GenerationFailed { .. } | Self::ResolverFailed { .. } => 4,
        }
    }
}
