//! Error taxonomy for the provisioning pipeline.
//!
//! All fallible operations in ragstack return `ProvisionResult<T>`. The
//! variants map one-to-one onto the recovery decisions the orchestrator
//! makes: retry, fetch-and-continue, or abort.

use thiserror::Error;

/// The unified error type for every ragstack crate.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The provider rejected a call for a reason expected to clear on its own
    /// (throttling, service unavailability, an execution role that has not
    /// propagated yet). Retried with bounded backoff where the step allows it.
    #[error("transient provider error during {operation}: {reason}")]
    TransientProvider { operation: String, reason: String },

    /// The resource is already present. Steps recover by fetching it by name.
    #[error("{resource} '{name}' already exists")]
    AlreadyExists { resource: String, name: String },

    /// The provider has no resource with this name or identifier.
    #[error("{resource} '{name}' not found")]
    NotFound { resource: String, name: String },

    /// A status poll exhausted its attempt budget without reaching a
    /// terminal status.
    #[error("timed out waiting for {resource} after {attempts} status checks (last status: {last_status})")]
    ProvisioningTimeout {
        resource: String,
        attempts: u32,
        last_status: String,
    },

    /// An ingestion job reached a terminal status other than `COMPLETE`.
    #[error("ingestion job '{job_id}' ended with status {status}: {reasons}")]
    TerminalJobFailure {
        job_id: String,
        status: String,
        reasons: String,
    },

    /// A required configuration value is absent.
    #[error("missing configuration value '{key}'")]
    ConfigurationMissing { key: String },

    /// A configuration value is present but malformed or out of range.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// An action-group API schema or payload failed verification.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// Any other provider or local failure. The pipeline aborts.
    #[error("{operation} failed: {reason}")]
    Fatal { operation: String, reason: String },
}

impl ProvisionError {
    /// Shorthand for a `Fatal` error.
    pub fn fatal(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fatal {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// True for errors the retry loop is allowed to absorb.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientProvider { .. })
    }

    /// True when the failed call would have created something that exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the ragstack crates.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// A raw error as reported by a provider: an error code plus message.
///
/// Provider-port implementations build one of these from whatever their
/// client library returns and call [`ProviderFault::classify`] to obtain the
/// typed error the orchestrator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFault {
    pub code: String,
    pub message: String,
}

impl ProviderFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map this fault onto the error taxonomy.
    ///
    /// `operation` names the call that failed (e.g. `"create_role"`);
    /// `resource` and `name` identify its target and are only used for
    /// `AlreadyExists` / `NotFound`.
    pub fn classify(&self, operation: &str, resource: &str, name: &str) -> ProvisionError {
        let reason = format!("{}: {}", self.code, self.message);
        match self.code.as_str() {
            "EntityAlreadyExists"
            | "EntityAlreadyExistsException"
            | "ConflictException"
            | "ResourceConflictException"
            | "ResourceAlreadyExistsException"
            | "BucketAlreadyOwnedByYou"
            | "resource_already_exists_exception" => ProvisionError::AlreadyExists {
                resource: resource.to_string(),
                name: name.to_string(),
            },

            "NoSuchEntity"
            | "NoSuchEntityException"
            | "NoSuchBucket"
            | "NotFound"
            | "ResourceNotFoundException"
            | "index_not_found_exception" => ProvisionError::NotFound {
                resource: resource.to_string(),
                name: name.to_string(),
            },

            "ThrottlingException"
            | "Throttling"
            | "TooManyRequestsException"
            | "ServiceUnavailableException"
            | "ServiceUnavailable"
            | "InternalServerException"
            | "InternalFailure"
            | "RequestTimeout" => ProvisionError::TransientProvider {
                operation: operation.to_string(),
                reason,
            },

            // Validation errors that complain about the execution role are the
            // eventual-consistency window after role creation, not a bad request.
            "ValidationException" | "InvalidParameterValueException"
                if mentions_role_propagation(&self.message) =>
            {
                ProvisionError::TransientProvider {
                    operation: operation.to_string(),
                    reason,
                }
            }

            _ => ProvisionError::Fatal {
                operation: operation.to_string(),
                reason,
            },
        }
    }
}

fn mentions_role_propagation(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("cannot be assumed")
        || lower.contains("unable to assume")
        || (lower.contains("role") && lower.contains("not authorized"))
        || (lower.contains("role") && lower.contains("permission"))
}
