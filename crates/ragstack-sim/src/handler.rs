//! Simulated action handler for the password-reset action group.
//!
//! Behaves like the bundled function: `POST /reset` with `{ "email" }`
//! answers `{ "message" }` carrying a temporary password. Request and
//! response bodies are checked against the action group's API schema, so a
//! schema that drifts from the handler shows up as a `SchemaValidation`
//! error rather than a silent mismatch.

use rand::{distr::Alphanumeric, Rng};
use serde_json::{json, Value};
use tracing::{debug, info};

use ragstack_contracts::{
    agent::ApiSchema,
    error::{ProvisionError, ProvisionResult},
};
use ragstack_verify::{engine::verify_payload, openapi::operations};

const TEMP_PASSWORD_LEN: usize = 12;
const COMPONENT_PREFIX: &str = "#/components/schemas/";

/// Run the operation at `verb api_path` with request body `body`.
pub fn invoke_action(
    schema: &ApiSchema,
    api_path: &str,
    verb: &str,
    body: &Value,
) -> ProvisionResult<Value> {
    let ops = operations(&schema.document);
    let op = ops
        .iter()
        .find(|op| op.path == api_path && op.method.eq_ignore_ascii_case(verb))
        .ok_or_else(|| ProvisionError::NotFound {
            resource: "operation".to_string(),
            name: format!("{} {}", verb.to_uppercase(), api_path),
        })?;

    if let Some(component) = component_of(op.body.pointer("/requestBody/content/application~1json/schema")) {
        check(schema, component, body)?;
    }

    let response = match op.operation_id() {
        Some("reset") => reset(body)?,
        other => {
            return Err(ProvisionError::fatal(
                "invoke action",
                format!("no handler for operation {:?}", other),
            ))
        }
    };

    if let Some(component) =
        component_of(op.body.pointer("/responses/200/content/application~1json/schema"))
    {
        check(schema, component, &response)?;
    }
    Ok(response)
}

fn reset(body: &Value) -> ProvisionResult<Value> {
    let email = body
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| e.contains('@'))
        .ok_or_else(|| ProvisionError::SchemaValidation {
            reason: "reset request needs an email address".to_string(),
        })?;

    let temp: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(TEMP_PASSWORD_LEN)
        .map(char::from)
        .collect();
    info!(email = %email, "password reset");

    Ok(json!({
        "message": format!(
            "The password for {email} has been reset. Your temporary password is {temp}."
        )
    }))
}

fn component_of(schema: Option<&Value>) -> Option<&str> {
    schema?
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix(COMPONENT_PREFIX))
}

fn check(schema: &ApiSchema, component: &str, payload: &Value) -> ProvisionResult<()> {
    let report = verify_payload(schema, component, payload)?;
    debug!(component = %component, passed = report.passed, "action payload checked");
    if report.passed {
        Ok(())
    } else {
        Err(ProvisionError::SchemaValidation {
            reason: report.summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use ragstack_contracts::{agent::ApiSchema, error::ProvisionError};

    use super::invoke_action;

    #[test]
    fn test_reset_returns_temporary_password() {
        let schema = ApiSchema::password_reset();
        let response =
            invoke_action(&schema, "/reset", "POST", &json!({ "email": "ana@example.com" })).unwrap();

        let message = response["message"].as_str().unwrap();
        assert!(message.contains("ana@example.com"));
        let temp = message
            .trim_end_matches('.')
            .rsplit(' ')
            .next()
            .unwrap();
        assert_eq!(temp.len(), 12);
        assert!(temp.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_request_must_match_schema() {
        let schema = ApiSchema::password_reset();
        let err = invoke_action(&schema, "/reset", "post", &json!({ "user": "ana" })).unwrap_err();
        assert!(matches!(err, ProvisionError::SchemaValidation { .. }), "got {:?}", err);
    }

    #[test]
    fn test_email_must_look_like_an_address() {
        let schema = ApiSchema::password_reset();
        let err = invoke_action(&schema, "/reset", "post", &json!({ "email": "ana" })).unwrap_err();
        assert!(matches!(err, ProvisionError::SchemaValidation { .. }));
    }

    #[test]
    fn test_unknown_operation() {
        let schema = ApiSchema::password_reset();
        let err = invoke_action(&schema, "/unlock", "post", &json!({})).unwrap_err();
        assert!(err.is_not_found());
    }
}
