//! # ragstack-verify
//!
//! Verification of the OpenAPI documents that describe an agent's action
//! group, and of the payloads exchanged with the action handler.
//!
//! [`engine::OpenApiVerifier`] implements
//! [`ragstack_core::traits::SchemaVerifier`] in two phases:
//!
//! 1. **Structural**: the document is validated against a JSON Schema of the
//!    OpenAPI 3 subset the agent service accepts.
//! 2. **Semantic**: every operation has a unique `operationId`, and every
//!    local `$ref` resolves. Hosting applications may register extra rules.
//!
//! [`engine::verify_payload`] checks a request or response body against one
//! of the document's component schemas.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use ragstack_verify::engine::{verify_payload, OpenApiVerifier};
//!
//! let verifier = OpenApiVerifier::new();
//! let report = verifier.verify_api_schema(&ApiSchema::password_reset())?;
//! assert!(report.passed);
//!
//! let report = verify_payload(&schema, "ResetRequest", &json!({ "email": "a@b.c" }))?;
//! ```

pub mod engine;
pub mod openapi;
