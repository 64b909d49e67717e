//! Endpoint handlers, one module per route group.

pub mod classify;
pub mod health;
pub mod query;
pub mod reference;
pub mod subject;
