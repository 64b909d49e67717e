//! The per-turn query pipeline.
//!
//! `orchestrator` sequences the stages; the sibling modules implement them:
//! category classification, subject-id extraction, graph-intent detection,
//! SQL generation and parsing, chart-spec parsing, result formatting, and
//! the conversation-scoped patient context.

pub mod category;
pub mod chart;
pub mod context;
pub mod format;
pub mod graph;
pub mod orchestrator;
pub mod sql;
pub mod subject;
