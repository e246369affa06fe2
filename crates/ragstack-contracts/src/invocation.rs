//! Query-path types: agent invocation events and knowledge-base answers.

use serde::{Deserialize, Serialize};

/// A single agent turn to run against an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub agent_id: String,
    pub alias_id: String,
    pub session_id: String,
    pub prompt: String,
    pub enable_trace: bool,
}

/// An intermediate reasoning or tool-call record emitted during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub session_id: String,
    pub trace: serde_json::Value,
}

/// One element of the streamed invocation response.
///
/// Trace and chunk events may interleave arbitrarily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationEvent {
    Trace(TraceEvent),
    Chunk { bytes: Vec<u8> },
}

/// The demultiplexed result of one agent turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// All chunk bytes in arrival order, decoded as UTF-8.
    pub answer: String,
    /// Trace events in arrival order.
    pub traces: Vec<TraceEvent>,
}

/// A retrieved passage supporting part of a generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub excerpt: String,
    pub source_uri: String,
}

/// Answer text generated from a knowledge base, with its sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}
