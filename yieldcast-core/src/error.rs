//! Error taxonomy of the estimation pipeline.

use std::fmt;

use crate::model::SystemKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Terminal failure of an estimate. None of these are retried inside the core.
pub enum EstimateError {
    /// The postcode does not exist upstream.
    #[error("Postcode not found: {0}")]
    LocationNotFound(String),
    /// The postcode service could not be reached or answered with an error.
    #[error("Postcode service unavailable: {0}")]
    LocationServiceUnavailable(String),
    /// The climate service could not be reached, answered with an error, or had no data.
    #[error("Climate service unavailable: {0}")]
    ClimateServiceUnavailable(String),
    /// The climate service answered with data that cannot be used.
    #[error("Climate data malformed: {0}")]
    ClimateDataMalformed(String),
    /// No yield model exists for this kind of system.
    #[error("Unsupported system type: {0}")]
    UnsupportedSystemType(SystemKind),
    /// A specification field is outside its declared bounds.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
    /// Anything else, e.g. a failing calculation sink.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Fieldless discriminant of [`EstimateError`], for mapping to external status codes.
pub enum ErrorKind {
    /// See [`EstimateError::LocationNotFound`].
    LocationNotFound,
    /// See [`EstimateError::LocationServiceUnavailable`].
    LocationServiceUnavailable,
    /// See [`EstimateError::ClimateServiceUnavailable`].
    ClimateServiceUnavailable,
    /// See [`EstimateError::ClimateDataMalformed`].
    ClimateDataMalformed,
    /// See [`EstimateError::UnsupportedSystemType`].
    UnsupportedSystemType,
    /// See [`EstimateError::Validation`].
    Validation,
    /// See [`EstimateError::Internal`].
    Internal,
}

impl EstimateError {
    /// Discriminant of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EstimateError::LocationNotFound(_) => ErrorKind::LocationNotFound,
            EstimateError::LocationServiceUnavailable(_) => ErrorKind::LocationServiceUnavailable,
            EstimateError::ClimateServiceUnavailable(_) => ErrorKind::ClimateServiceUnavailable,
            EstimateError::ClimateDataMalformed(_) => ErrorKind::ClimateDataMalformed,
            EstimateError::UnsupportedSystemType(_) => ErrorKind::UnsupportedSystemType,
            EstimateError::Validation { .. } => ErrorKind::Validation,
            EstimateError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::LocationNotFound => "INVALID_POSTCODE",
            ErrorKind::LocationServiceUnavailable => "POSTCODE_SERVICE_ERROR",
            ErrorKind::ClimateServiceUnavailable => "CLIMATE_API_ERROR",
            ErrorKind::ClimateDataMalformed => "CLIMATE_DATA_MALFORMED",
            ErrorKind::UnsupportedSystemType => "NOT_IMPLEMENTED",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// The caller sent something wrong.
    #[must_use]
    pub fn is_client_error(self) -> bool {
        matches!(self, ErrorKind::LocationNotFound | ErrorKind::Validation)
    }

    /// An upstream dependency failed or sent bad data.
    #[must_use]
    pub fn is_upstream_error(self) -> bool {
        matches!(
            self,
            ErrorKind::LocationServiceUnavailable
                | ErrorKind::ClimateServiceUnavailable
                | ErrorKind::ClimateDataMalformed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code())
    }
}
