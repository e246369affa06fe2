//! # ragstack-sim
//!
//! An in-process stand-in for the managed cloud services a ragstack run
//! talks to. It implements every provider port plus the agent runtime, so
//! the provisioner and the query path can run end to end without network
//! access or credentials.
//!
//! What it simulates:
//! - Resource lifecycles with scriptable status sequences (`SimScript`)
//! - Provider error codes, classified exactly as a real binding would
//! - Ingestion: objects under a data source's prefixes are chunked per the
//!   chunking policy and indexed for keyword retrieval
//! - Agent turns: routed to the password-reset action handler or answered
//!   from the associated knowledge base, streamed as trace and chunk events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragstack_sim::SimulatedCloud;
//!
//! let cloud = SimulatedCloud::new("123456789012", "us-east-1");
//! let provisioner = Provisioner::new(cloud.providers(), ledger, verifier, sleeper, config)?;
//! let outputs = provisioner.run()?;
//! let reply = invoke_agent(&cloud, &outputs.agent_id, &outputs.agent_alias_id, "s1", "hi")?;
//! ```

pub mod cloud;
pub mod demo;
pub mod handler;
pub mod retrieval;
pub mod runtime;

pub use cloud::{SimScript, SimulatedCloud};
pub use demo::{seed_demo_stack, DemoStack};
