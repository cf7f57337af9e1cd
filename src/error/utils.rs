use crate::domain::entities::ClusterId;
use crate::error::AppError;

/// Common error handling utilities
pub struct ErrorUtils;

impl ErrorUtils {
    /// Create a validation error for missing required field
    pub fn missing_field_error(field_name: &str) -> AppError {
        AppError::ValidationError(format!("{} is required", field_name))
    }

    /// Create a validation error for invalid format
    pub fn invalid_format_error(field_name: &str) -> AppError {
        AppError::ValidationError(format!("Invalid {} format", field_name))
    }

    /// Create a not found error with context
    pub fn not_found_error(resource: &str, id: &str) -> AppError {
        AppError::NotFound(format!("{} {} not found", resource, id))
    }

    /// Rejection for a batch submitted without any node
    pub fn empty_batch_error(operation: &str) -> AppError {
        AppError::ValidationError(format!("{}: redis node list is empty", operation))
    }

    /// Rejection for a batch whose owning cluster is unknown
    pub fn cluster_not_found(cluster_id: ClusterId) -> AppError {
        AppError::ValidationError(format!("Cluster {} not found", cluster_id))
    }

    /// Wrap a failed cluster command with the endpoint it was sent to
    pub fn protocol_error(endpoint: &str, message: impl std::fmt::Display) -> AppError {
        AppError::ProtocolError(format!("{}: {}", endpoint, message))
    }

    /// Wrap a registry failure
    pub fn persistence_error(message: impl std::fmt::Display) -> AppError {
        AppError::PersistenceError(message.to_string())
    }

    /// Validate non-empty string
    pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), AppError> {
        if value.trim().is_empty() {
            Err(Self::missing_field_error(field_name))
        } else {
            Ok(())
        }
    }
}
