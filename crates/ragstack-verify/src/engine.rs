//! API schema verifier for action groups.
//!
//! `OpenApiVerifier` implements the `SchemaVerifier` trait from
//! `ragstack-core`. Verification runs in two phases:
//!
//! 1. **Structural**: the document is validated against
//!    [`openapi::document_schema`] using the `jsonschema` crate.
//! 2. **Semantic**: operation ids are present and unique, local `$ref`s
//!    resolve, and any registered custom rules pass. All failures are
//!    collected before returning.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use tracing::{debug, warn};

use ragstack_contracts::{
    agent::ApiSchema,
    error::{ProvisionError, ProvisionResult},
    verify::{VerificationFailure, VerificationReport},
};
use ragstack_core::traits::SchemaVerifier;

use crate::openapi::{self, operations, references};

pub const RULE_STRUCTURE: &str = "openapi.structure";
pub const RULE_OPERATION_ID: &str = "openapi.operation-id";
pub const RULE_UNIQUE_OPERATION_ID: &str = "openapi.unique-operation-id";
pub const RULE_REF: &str = "openapi.ref";
pub const RULE_PAYLOAD: &str = "payload.schema";

/// A caller-supplied check over the whole API document.
///
/// Returns `Some(message)` when the check fails.
pub type CustomRuleFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

pub struct OpenApiVerifier {
    /// Keyed by rule id; a `BTreeMap` so failures come out in a stable order.
    custom_rules: BTreeMap<String, CustomRuleFn>,
}

impl OpenApiVerifier {
    pub fn new() -> Self {
        Self {
            custom_rules: BTreeMap::new(),
        }
    }

    /// Register an extra document check under `rule_id`. Registering the
    /// same id twice replaces the earlier check.
    pub fn register_rule(&mut self, rule_id: impl Into<String>, f: CustomRuleFn) {
        self.custom_rules.insert(rule_id.into(), f);
    }

    fn structural(document: &Value, failures: &mut Vec<VerificationFailure>) {
        let meta = openapi::document_schema();
        match jsonschema::validator_for(&meta) {
            Ok(validator) => {
                for error in validator.iter_errors(document) {
                    let message = format!("invalid document at '{}': {}", error.instance_path, error);
                    warn!(%message, "structural validation failure");
                    failures.push(failure(RULE_STRUCTURE, message));
                }
            }
            Err(e) => failures.push(failure(
                RULE_STRUCTURE,
                format!("document schema failed to compile: {e}"),
            )),
        }
    }

    fn semantic(document: &Value, failures: &mut Vec<VerificationFailure>) {
        let mut seen: HashMap<&str, String> = HashMap::new();
        for op in operations(document) {
            match op.operation_id() {
                None => failures.push(failure(
                    RULE_OPERATION_ID,
                    format!("{} has no operationId", op.label()),
                )),
                Some(id) => {
                    if let Some(first) = seen.get(id) {
                        failures.push(failure(
                            RULE_UNIQUE_OPERATION_ID,
                            format!("operationId '{id}' is used by both {first} and {}", op.label()),
                        ));
                    } else {
                        seen.insert(id, op.label());
                    }
                }
            }
        }

        for (location, target) in references(document) {
            let Some(pointer) = target.strip_prefix('#') else {
                failures.push(failure(
                    RULE_REF,
                    format!("'{target}' at '{location}' is not a local reference"),
                ));
                continue;
            };
            if document.pointer(pointer).is_none() {
                failures.push(failure(
                    RULE_REF,
                    format!("'{target}' at '{location}' does not resolve"),
                ));
            }
        }
    }
}

impl Default for OpenApiVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaVerifier for OpenApiVerifier {
    fn verify_api_schema(&self, schema: &ApiSchema) -> ProvisionResult<VerificationReport> {
        let document = &schema.document;
        let mut failures = Vec::new();

        Self::structural(document, &mut failures);
        Self::semantic(document, &mut failures);

        for (rule_id, rule) in &self.custom_rules {
            debug!(rule_id = %rule_id, "evaluating custom rule");
            if let Some(message) = rule(document) {
                warn!(rule_id = %rule_id, %message, "custom rule failed");
                failures.push(failure(rule_id, message));
            }
        }

        let report = VerificationReport::from_failures(failures);
        debug!(
            passed = report.passed,
            failure_count = report.failures.len(),
            "api schema verification complete"
        );
        Ok(report)
    }
}

/// Validate `payload` against the component schema `component` of `schema`.
///
/// `$ref`s inside the component resolve against the document's other
/// components. A component that does not exist is a `NotFound` error, not a
/// failed report: it means the caller asked the wrong question.
pub fn verify_payload(
    schema: &ApiSchema,
    component: &str,
    payload: &Value,
) -> ProvisionResult<VerificationReport> {
    if schema.component(component).is_none() {
        return Err(ProvisionError::NotFound {
            resource: "schema component".to_string(),
            name: component.to_string(),
        });
    }

    let components = schema
        .document
        .get("components")
        .cloned()
        .unwrap_or_else(|| json!({}));
    let rooted = json!({
        "$ref": format!("#/components/schemas/{component}"),
        "components": components,
    });

    let validator = jsonschema::validator_for(&rooted).map_err(|e| ProvisionError::SchemaValidation {
        reason: format!("component '{component}' does not compile: {e}"),
    })?;

    let failures: Vec<_> = validator
        .iter_errors(payload)
        .map(|error| {
            failure(
                RULE_PAYLOAD,
                format!("{component} violation at '{}': {}", error.instance_path, error),
            )
        })
        .collect();

    debug!(component = %component, failure_count = failures.len(), "payload verified");
    Ok(VerificationReport::from_failures(failures))
}

fn failure(rule_id: &str, message: impl Into<String>) -> VerificationFailure {
    VerificationFailure {
        rule_id: rule_id.to_string(),
        message: message.into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use ragstack_contracts::{agent::ApiSchema, error::ProvisionError};
    use ragstack_core::traits::SchemaVerifier;

    use super::{
        verify_payload, OpenApiVerifier, RULE_OPERATION_ID, RULE_PAYLOAD, RULE_REF,
        RULE_STRUCTURE, RULE_UNIQUE_OPERATION_ID,
    };

    fn rule_ids(report: &ragstack_contracts::verify::VerificationReport) -> Vec<&str> {
        report.failures.iter().map(|f| f.rule_id.as_str()).collect()
    }

    // ── Document verification ────────────────────────────────────────────────

    #[test]
    fn test_password_reset_schema_passes() {
        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::password_reset())
            .unwrap();
        assert!(report.passed, "failures: {:?}", report.failures);
    }

    #[test]
    fn test_missing_info_fails_structurally() {
        let mut doc = ApiSchema::password_reset().document;
        doc.as_object_mut().unwrap().remove("info");

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        assert!(!report.passed);
        assert!(rule_ids(&report).contains(&RULE_STRUCTURE));
    }

    #[test]
    fn test_wrong_openapi_version_fails() {
        let mut doc = ApiSchema::password_reset().document;
        doc["openapi"] = json!("2.0");

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        assert_eq!(rule_ids(&report), vec![RULE_STRUCTURE]);
    }

    #[test]
    fn test_operation_without_id_fails() {
        let mut doc = ApiSchema::password_reset().document;
        doc["paths"]["/reset"]["post"]
            .as_object_mut()
            .unwrap()
            .remove("operationId");

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        assert_eq!(rule_ids(&report), vec![RULE_OPERATION_ID]);
        assert!(report.failures[0].message.contains("POST /reset"));
    }

    #[test]
    fn test_duplicate_operation_ids_fail() {
        let mut doc = ApiSchema::password_reset().document;
        doc["paths"]["/reset/temp"] = json!({
            "get": {
                "operationId": "reset",
                "responses": { "200": { "description": "ok" } }
            }
        });

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        assert_eq!(rule_ids(&report), vec![RULE_UNIQUE_OPERATION_ID]);
    }

    #[test]
    fn test_dangling_ref_fails() {
        let mut doc = ApiSchema::password_reset().document;
        doc["paths"]["/reset"]["post"]["requestBody"]["content"]["application/json"]["schema"] =
            json!({ "$ref": "#/components/schemas/Missing" });

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        assert_eq!(rule_ids(&report), vec![RULE_REF]);
        assert!(report.failures[0].message.contains("application~1json"));
    }

    #[test]
    fn test_remote_ref_fails() {
        let mut doc = ApiSchema::password_reset().document;
        doc["components"]["schemas"]["ResetRequest"] =
            json!({ "$ref": "https://example.com/schemas/reset.json" });

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        assert!(rule_ids(&report).contains(&RULE_REF));
    }

    /// Every failure is reported, not just the first.
    #[test]
    fn test_failures_accumulate() {
        let doc = json!({
            "openapi": "3.0.0",
            "paths": {
                "/a": { "get": { "responses": { "200": { "description": "ok" } } } },
                "/b": { "post": {
                    "operationId": "b",
                    "responses": { "200": { "$ref": "#/components/responses/Nope" } }
                } }
            }
        });

        let report = OpenApiVerifier::new()
            .verify_api_schema(&ApiSchema::new(doc))
            .unwrap();
        let ids = rule_ids(&report);
        assert!(ids.contains(&RULE_STRUCTURE));
        assert!(ids.contains(&RULE_OPERATION_ID));
        assert!(ids.contains(&RULE_REF));
    }

    #[test]
    fn test_custom_rule() {
        let mut verifier = OpenApiVerifier::new();
        verifier.register_rule(
            "house.single-path",
            Box::new(|doc: &serde_json::Value| {
                let count = doc["paths"].as_object().map(|p| p.len()).unwrap_or(0);
                (count != 1).then(|| format!("expected exactly one path, found {count}"))
            }),
        );

        let schema = ApiSchema::password_reset();
        assert!(verifier.verify_api_schema(&schema).unwrap().passed);

        let mut doc = schema.document.clone();
        doc["paths"]["/status"] = json!({
            "get": { "operationId": "status", "responses": { "200": { "description": "ok" } } }
        });
        let report = verifier.verify_api_schema(&ApiSchema::new(doc)).unwrap();
        assert_eq!(rule_ids(&report), vec!["house.single-path"]);
    }

    // ── Payload verification ─────────────────────────────────────────────────

    #[test]
    fn test_payload_matches_component() {
        let schema = ApiSchema::password_reset();
        let report = verify_payload(&schema, "ResetRequest", &json!({ "email": "a@example.com" }))
            .unwrap();
        assert!(report.passed, "failures: {:?}", report.failures);
    }

    #[test]
    fn test_payload_missing_required_field() {
        let schema = ApiSchema::password_reset();
        let report = verify_payload(&schema, "ResetRequest", &json!({ "user": "alice" })).unwrap();
        assert!(!report.passed);
        assert_eq!(report.failures[0].rule_id, RULE_PAYLOAD);
    }

    #[test]
    fn test_payload_wrong_type() {
        let schema = ApiSchema::password_reset();
        let report = verify_payload(&schema, "TempResponse", &json!({ "tempPassword": 42 })).unwrap();
        assert!(!report.passed);
    }

    /// A component that refers to another component is followed.
    #[test]
    fn test_payload_follows_component_refs() {
        let mut doc = ApiSchema::password_reset().document;
        doc["components"]["schemas"]["Envelope"] = json!({
            "type": "object",
            "required": ["body"],
            "properties": { "body": { "$ref": "#/components/schemas/ResetResponse" } }
        });
        let schema = ApiSchema::new(doc);

        let ok = verify_payload(&schema, "Envelope", &json!({ "body": { "message": "done" } })).unwrap();
        assert!(ok.passed, "failures: {:?}", ok.failures);

        let bad = verify_payload(&schema, "Envelope", &json!({ "body": {} })).unwrap();
        assert!(!bad.passed);
    }

    #[test]
    fn test_unknown_component_is_not_found() {
        let schema = ApiSchema::password_reset();
        match verify_payload(&schema, "Nope", &json!({})) {
            Err(ProvisionError::NotFound { name, .. }) => assert_eq!(name, "Nope"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
