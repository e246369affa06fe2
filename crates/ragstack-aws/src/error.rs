//! Turning SDK failures into the provisioning error taxonomy.
//!
//! Every service crate re-exports the same `SdkError` and
//! `ProvideErrorMetadata`, so one classifier covers all of them. Service
//! errors go through [`ProviderFault::classify`] by error code. Timeouts and
//! dispatch failures never reached the service and are worth retrying.
//! Anything else is fatal.

use std::fmt;

use aws_sdk_s3::error::SdkError;
use aws_smithy_types::error::{metadata::ProvideErrorMetadata, operation::BuildError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use ragstack_contracts::error::{ProviderFault, ProvisionError, ProvisionResult};

/// Classify a failed SDK call. `resource` and `name` identify its target.
pub fn classify<E, R>(err: SdkError<E, R>, operation: &str, resource: &str, name: &str) -> ProvisionError
where
    E: ProvideErrorMetadata + fmt::Debug,
    R: fmt::Debug,
{
    match &err {
        SdkError::ServiceError(service) => fault(service.err()).classify(operation, resource, name),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ProvisionError::TransientProvider {
                operation: operation.to_string(),
                reason: format!("{err:?}"),
            }
        }
        _ => ProvisionError::fatal(operation, format!("{err:?}")),
    }
}

/// Code and message of a service error.
pub fn fault(err: &impl ProvideErrorMetadata) -> ProviderFault {
    ProviderFault::new(err.code().unwrap_or("Unknown"), err.message().unwrap_or_default())
}

/// A request shape the SDK refused to build is a bug on our side.
pub fn built<T>(operation: &str, result: Result<T, BuildError>) -> ProvisionResult<T> {
    result.map_err(|e| ProvisionError::fatal(operation, format!("malformed request: {e}")))
}

/// A field the provider should always return but didn't.
pub fn missing_field(operation: &str, field: &str) -> ProvisionError {
    ProvisionError::fatal(operation, format!("response has no {field}"))
}

/// Parse a provider status string into one of the contract status enums.
pub fn parse_status<T: DeserializeOwned>(operation: &str, raw: &str) -> ProvisionResult<T> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| ProvisionError::fatal(operation, format!("unexpected status '{raw}'")))
}

/// The provider's spelling of a contract enum, e.g. `PRE_PROCESSING`.
pub fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}
