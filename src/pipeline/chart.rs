//! Chart specification extraction.
//!
//! The formatting pass asks the service for a Chart.js-style JSON object.
//! The parser digs that object out of free-form text: first the greedy
//! brace slice containing `"type"`, then a fenced code block as fallback.
//! Anything that doesn't validate is "no chart" — never an error.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
}

/// One dataset within a chart. Color fields keep the Chart.js convention of
/// "string or array of strings", so they stay as raw JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    #[serde(default)]
    pub label: Option<String>,
    pub data: Vec<f64>,
    #[serde(
        default,
        rename = "backgroundColor",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_color: Option<Value>,
    #[serde(
        default,
        rename = "borderColor",
        skip_serializing_if = "Option::is_none"
    )]
    pub border_color: Option<Value>,
    #[serde(
        default,
        rename = "borderWidth",
        skip_serializing_if = "Option::is_none"
    )]
    pub border_width: Option<f64>,
}

/// A validated chart specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: Option<String>,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartSpec {
    /// Every dataset must carry one value per label.
    pub fn is_consistent(&self) -> bool {
        self.datasets
            .iter()
            .all(|d| d.data.len() == self.labels.len())
    }
}

/// Extract a chart specification from free-form generation output.
///
/// Returns `None` when no parsable, consistent spec is present. Never
/// panics on malformed input.
pub fn parse_chart_spec(content: &str) -> Option<ChartSpec> {
    if let Some(spec) = brace_slice(content).and_then(parse_candidate) {
        return Some(spec);
    }
    fenced_block(content).and_then(parse_candidate)
}

/// Greedy first-`{` to last-`}` slice, kept only if it mentions `"type"`.
fn brace_slice(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    let slice = &content[start..=end];
    slice.contains("\"type\"").then_some(slice)
}

/// Interior of the first fenced code block (optionally tagged `json`).
fn fenced_block(content: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());
    fence.captures(content).map(|caps| caps.get(1).unwrap().as_str())
}

/// Parse and validate one candidate JSON string.
fn parse_candidate(candidate: &str) -> Option<ChartSpec> {
    // Required keys are checked on the raw object first so that an object
    // missing `datasets` is "no chart" rather than a deserialization detour.
    let raw: Value = serde_json::from_str(candidate).ok()?;
    let object = raw.as_object()?;
    if !["type", "labels", "datasets"]
        .iter()
        .all(|key| object.contains_key(*key))
    {
        return None;
    }

    let spec: ChartSpec = serde_json::from_value(raw).ok()?;
    if !spec.is_consistent() {
        tracing::debug!("Chart spec rejected: labels/data length mismatch");
        return None;
    }
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CHART: &str = r##"{
        "type": "bar",
        "title": "Admissions by month",
        "labels": ["Jan", "Feb", "Mar"],
        "datasets": [
            {
                "label": "Admissions",
                "data": [12, 19, 7],
                "backgroundColor": ["#bbdefb", "#90caf9", "#64b5f6"],
                "borderWidth": 1
            }
        ]
    }"##;

    #[test]
    fn parses_bare_json_object() {
        let spec = parse_chart_spec(VALID_CHART).unwrap();
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.labels, vec!["Jan", "Feb", "Mar"]);
        assert_eq!(spec.datasets[0].data, vec![12.0, 19.0, 7.0]);
    }

    #[test]
    fn parses_object_embedded_in_prose() {
        let content = format!("Here is your chart specification:\n{VALID_CHART}\nEnjoy!");
        let spec = parse_chart_spec(&content).unwrap();
        assert_eq!(spec.title.as_deref(), Some("Admissions by month"));
    }

    #[test]
    fn falls_back_to_fenced_block() {
        // The prose braces don't parse; the fenced block does.
        let content = format!(
            "The shape is {{kind}} with \"type\" markers.\n```json\n{VALID_CHART}\n```"
        );
        assert!(parse_chart_spec(&content).is_some());
    }

    #[test]
    fn missing_required_key_is_no_chart() {
        let content = r#"{"type": "bar", "labels": ["a"]}"#;
        assert_eq!(parse_chart_spec(content), None);
    }

    #[test]
    fn unknown_kind_is_no_chart() {
        let content = r#"{"type": "scatter", "labels": ["a"], "datasets": [{"data": [1]}]}"#;
        assert_eq!(parse_chart_spec(content), None);
    }

    #[test]
    fn label_data_length_mismatch_is_no_chart() {
        let content = r#"{
            "type": "line",
            "labels": ["a", "b", "c"],
            "datasets": [{"data": [1, 2]}]
        }"#;
        assert_eq!(parse_chart_spec(content), None);
    }

    #[test]
    fn malformed_input_never_panics() {
        for garbage in [
            "",
            "no json here",
            "{unclosed",
            "}{",
            "``` ```",
            "{\"type\": }",
        ] {
            assert_eq!(parse_chart_spec(garbage), None);
        }
    }

    #[test]
    fn pie_chart_with_string_color() {
        let content = r##"{
            "type": "pie",
            "labels": ["Medicare", "Private"],
            "datasets": [{
                "label": "Insurance",
                "data": [60, 40],
                "backgroundColor": "#e3f2fd"
            }]
        }"##;
        let spec = parse_chart_spec(content).unwrap();
        assert_eq!(spec.kind, ChartKind::Pie);
        assert_eq!(
            spec.datasets[0].background_color,
            Some(Value::String("#e3f2fd".into()))
        );
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let spec = parse_chart_spec(VALID_CHART).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "bar");
        assert!(json["datasets"][0].get("backgroundColor").is_some());
        assert!(json["datasets"][0].get("background_color").is_none());
    }
}
