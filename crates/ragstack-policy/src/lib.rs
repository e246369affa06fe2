//! # ragstack-policy
//!
//! Typed policy documents for every role and collection the provisioner
//! creates.
//!
//! ## Overview
//!
//! - [`document`]: identity-policy documents and their least-privilege check.
//! - [`grant`]: one [`Grant`] per permission a role needs, plus the trust
//!   policy for each [`RolePurpose`](ragstack_contracts::naming::RolePurpose).
//! - [`collection`]: encryption, network and data-access policies of the
//!   vector-search service.
//!
//! Nothing here calls a provider. The provisioner renders these documents
//! and hands the JSON text to the identity and vector-store ports.

pub mod collection;
pub mod document;
pub mod grant;

pub use document::{Effect, PolicyDocument, Principal, Statement};
pub use grant::{service_principal, trust_policy, Grant};

// ── Tests ─────────────────────────────────────────────────────────────────────
