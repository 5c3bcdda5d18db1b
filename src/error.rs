// ⚠️ Error taxonomy for the reconciliation service
// Every failure a request can hit, with its HTTP status

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Unknown database (or any other missing resource)
    #[error("{0}")]
    NotFound(String),

    /// Table missing, or reconciliation not set up for it
    #[error("{0}")]
    NotConfigured(String),

    /// Reconciliation settings are malformed
    #[error("{0}")]
    Configuration(String),

    /// A setting has the wrong type (e.g. non-integer `max_limit`)
    #[error("{0}")]
    InvalidSettingType(String),

    #[error("Bad reconciliation query: {0}")]
    BadQuery(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Host settings file could not be read or parsed
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconcileError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ReconcileError::NotFound(_) | ReconcileError::NotConfigured(_) => 404,
            ReconcileError::Forbidden(_) => 403,
            ReconcileError::BadQuery(_)
            | ReconcileError::UnknownProperty(_)
            | ReconcileError::Json(_) => 400,
            ReconcileError::Configuration(_)
            | ReconcileError::InvalidSettingType(_)
            | ReconcileError::Store(_)
            | ReconcileError::Csv(_)
            | ReconcileError::Io(_)
            | ReconcileError::Settings(_)
            | ReconcileError::Internal(_) => 500,
        }
    }

    /// Stable error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::NotFound(_) => "NOT_FOUND",
            ReconcileError::NotConfigured(_) => "NOT_CONFIGURED",
            ReconcileError::Configuration(_) => "CONFIGURATION_ERROR",
            ReconcileError::InvalidSettingType(_) => "INVALID_SETTING_TYPE",
            ReconcileError::BadQuery(_) => "BAD_QUERY",
            ReconcileError::UnknownProperty(_) => "UNKNOWN_PROPERTY",
            ReconcileError::Forbidden(_) => "FORBIDDEN",
            ReconcileError::Store(_) => "STORE_ERROR",
            ReconcileError::Json(_) => "INVALID_JSON",
            ReconcileError::Csv(_) => "CSV_ERROR",
            ReconcileError::Io(_) => "IO_ERROR",
            ReconcileError::Settings(_) => "SETTINGS_ERROR",
            ReconcileError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        ReconcileError::Configuration(msg.into())
    }

    pub(crate) fn bad_query(msg: impl Into<String>) -> Self {
        ReconcileError::BadQuery(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_is_404() {
        let err = ReconcileError::NotConfigured("Table not found: cats".to_string());
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Table not found: cats");
    }

    #[test]
    fn test_configuration_error_is_server_error() {
        let err = ReconcileError::configuration("Name field must be defined to activate reconciliation");
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_client_errors_are_400() {
        assert_eq!(ReconcileError::bad_query("Query must be a string").status_code(), 400);
        assert_eq!(ReconcileError::UnknownProperty("colour".into()).status_code(), 400);

        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(ReconcileError::from(json_err).status_code(), 400);
    }

    #[test]
    fn test_io_error_is_server_error() {
        let err = ReconcileError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), "IO_ERROR");
        assert_eq!(err.to_string(), "I/O error: no such file");
    }
}
