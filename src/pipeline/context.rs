//! Conversation-scoped patient context.
//!
//! The one piece of state that outlives a turn. It is a plain value passed
//! into and returned from the orchestrator — no ambient globals — so
//! independent conversations can run concurrently and tests stay simple.
//!
//! The row and SQL recovery helpers here are explicitly best-effort: they
//! scrape identifiers out of arbitrary result rows and generated SQL text.
//! They are heuristic, not authoritative, and are tested against the
//! literal patterns they must match and miss.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Row;

/// Field names that may carry an admission identifier in result rows,
/// checked in order.
const ADMISSION_ID_FIELDS: [&str; 4] = ["hadm_id", "admission_id", "admissionid", "adm_id"];

/// Active patient/admission identifiers for one conversation.
///
/// Updated only when a turn yields a non-null identifier; an absent
/// extraction never clears a previously known one. Cleared only by an
/// explicit conversation reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    pub active_subject_id: Option<String>,
    pub active_admission_id: Option<String>,
}

impl PatientContext {
    /// Record a newly seen subject id. `None` is a no-op.
    pub fn observe_subject(&mut self, id: Option<&str>) {
        if let Some(id) = id {
            if self.active_subject_id.as_deref() != Some(id) {
                tracing::info!(subject_id = id, "Active patient updated");
            }
            self.active_subject_id = Some(id.to_string());
        }
    }

    /// Record a newly seen admission id. `None` is a no-op.
    pub fn observe_admission(&mut self, id: Option<&str>) {
        if let Some(id) = id {
            self.active_admission_id = Some(id.to_string());
        }
    }

    /// Explicit conversation reset — the only way identifiers are cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prompt fragment naming the active identifiers, when any are known.
    pub fn prompt_line(&self) -> Option<String> {
        match (&self.active_subject_id, &self.active_admission_id) {
            (None, None) => None,
            (subject, admission) => {
                let mut line = String::from("ACTIVE PATIENT CONTEXT:");
                if let Some(s) = subject {
                    line.push_str(&format!(" the current subject_id is {s}."));
                }
                if let Some(a) = admission {
                    line.push_str(&format!(" the current admission id (hadm_id) is {a}."));
                }
                Some(line)
            }
        }
    }
}

/// Stringify an identifier-bearing JSON value. Strings and integers count;
/// everything else (null, objects, empty strings) does not.
fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Subject id carried by the first result row, if any.
pub fn subject_id_from_rows(rows: &[Row]) -> Option<String> {
    rows.first()?.get("subject_id").and_then(value_to_id)
}

/// Admission id carried by the first result row, under any of the known
/// field names.
pub fn admission_id_from_rows(rows: &[Row]) -> Option<String> {
    let first = rows.first()?;
    ADMISSION_ID_FIELDS
        .iter()
        .find_map(|field| first.get(*field).and_then(value_to_id))
}

/// Best-effort fallback: scrape an admission id out of the generated SQL
/// text via an equality pattern on `hadm_id` / `admission_id`. Used only
/// when the rows themselves don't carry one.
pub fn admission_id_from_sql(sql: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:hadm_id|admission_id)\s*=\s*'?(\d+)").unwrap()
    });
    re.captures(sql).map(|caps| caps[1].to_string())
}
