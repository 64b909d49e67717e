//! Wardchat — ask free-text questions about hospital records.
//!
//! Each conversational turn runs a fixed pipeline: classify the question's
//! intent, extract any mentioned patient identifier, decide whether a chart
//! was requested, generate schema-grounded SQL through the completion
//! service, execute it against the SQLite store, and run a second generation
//! pass that renders the raw rows as HTML or as a chart specification.
//!
//! The pipeline degrades gracefully wherever the completion service returns
//! malformed output: an unrecognized category falls back to a default, a
//! non-numeric identifier becomes "no identifier", an unparsable chart
//! becomes "no chart". Only SQL generation and SQL execution failures abort
//! a turn.

pub mod api;
pub mod config;
pub mod debounce;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod store;
