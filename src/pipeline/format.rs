//! Result formatting — the second generation pass.
//!
//! Two mutually exclusive modes selected by the graph flag: prose mode
//! renders the rows as readable HTML; chart mode asks for a Chart.js-style
//! JSON spec and runs it through the chart parser. Any failure here —
//! service error or unparsable chart — degrades to `Unavailable`; the turn
//! still returns raw rows and SQL.

use crate::llm::{CompletionClient, CompletionRequest};
use crate::pipeline::category::QueryCategory;
use crate::pipeline::chart::{parse_chart_spec, ChartSpec};
use crate::store::Row;

/// Outcome of the formatting pass. `Unavailable` is a normal, silent
/// degradation — the user simply sees no enhanced output.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedOutput {
    Markup(String),
    Chart(ChartSpec),
    Unavailable,
}

/// Category-specific structural guidance for prose mode.
///
/// A sibling of the SQL pass's guidance, tuned separately for presentation
/// rather than retrieval.
fn formatting_guidance(category: QueryCategory) -> &'static str {
    match category {
        QueryCategory::DischargeSummary => {
            "These are instructions for a discharge summary format. Make sure each of these sections are present in the response.\n\n\
             Admission ID\n\
             Subject ID\n\
             Discharge Summary\n\
             Admission Date [admission date]\n\
             Discharge Date [discharge date]\n\n\
             Diagnosis\n\
             List of relevant diagnoses - order by severity.\n\n\
             Hospital Course\n\
             Combine the procedures, transfers, medications/prescriptions received during admission \
             and physician orders into a single section called \"hospital course\". Write it as a story.\n\n\
             Discharge disposition\n\
             Use the admissions table discharge_location field.\n\n\
             Discharge instructions\n\
             Write example discharge instructions based on the relevant patient information - if \
             surgical, write about wound care, otherwise also write about when to return to hospital \
             (given what symptoms).\n\n\
             Follow up instructions\n\
             Write example follow up instructions based on the relevant patient information."
        }
        QueryCategory::LabResults => {
            "When writing out lab results, generate a nice table with lots of whitespace for each cell."
        }
        _ => "",
    }
}

/// Chart-mode prompt: the requested JSON shape plus the fixed blue palette
/// convention.
const CHART_GUIDANCE: &str = r##"The user has requested visualization of the provided data. Generate a chart specification based on the query results.
The chart specification should be provided as a JSON object in a specific format that can be directly used by Chart.js.

Here is the format for the chart data:
{
  "type": "One of: 'line', 'bar', or 'pie', depending on what best fits the data",
  "title": "A descriptive title for the chart",
  "labels": ["List of labels for the x-axis or pie segments"],
  "datasets": [
    {
      "label": "Dataset name",
      "data": [Array of numeric values],
      "backgroundColor": "Color or array of colors for the chart elements",
      "borderColor": "Color or array of colors for the borders",
      "borderWidth": 1
    }
  ]
}

For time series data, use line charts with dates as labels.
For comparing categories, use bar charts.
For showing proportions of a whole, use pie charts.

IMPORTANT: Always use a blue color palette for all visualizations. Here are the specific blue shades to use:
- For line charts: Use "#0d47a1" (dark blue) for the line color with a border width of 2
- For bar charts: Use an array of different blue shades ["#bbdefb", "#90caf9", "#64b5f6", "#42a5f5", "#2196f3", "#1e88e5", "#1976d2", "#1565c0", "#0d47a1", "#0a3880"] for different categories
- For pie charts: Use an array of different blue shades ["#e3f2fd", "#bbdefb", "#90caf9", "#64b5f6", "#42a5f5", "#2196f3", "#1e88e5", "#1976d2", "#1565c0", "#0d47a1"]

For dataset backgrounds that need transparency (like in line charts), use rgba format with transparency: "rgba(33, 150, 243, 0.2)" (light blue with transparency)."##;

/// Renders raw rows into HTML or a chart spec via the completion service.
pub struct ResultFormatter<'a> {
    client: &'a dyn CompletionClient,
    model: &'a str,
}

impl<'a> ResultFormatter<'a> {
    pub fn new(client: &'a dyn CompletionClient, model: &'a str) -> Self {
        Self { client, model }
    }

    /// Format the turn's rows. Infallible by design: every failure path
    /// collapses to `Unavailable`.
    pub async fn format(
        &self,
        question: &str,
        rows: &[Row],
        category: Option<QueryCategory>,
        needs_graph: bool,
    ) -> FormattedOutput {
        let system = build_system_prompt(category, needs_graph);
        let user = build_user_prompt(question, rows, needs_graph);

        let content = match self
            .client
            .complete(CompletionRequest {
                model: self.model,
                system: &system,
                user: &user,
                temperature: 1.0,
                max_tokens: 10_000,
            })
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Formatting unavailable");
                return FormattedOutput::Unavailable;
            }
        };

        if needs_graph {
            match parse_chart_spec(&content) {
                Some(spec) => FormattedOutput::Chart(spec),
                None => {
                    tracing::warn!("No chart spec found in formatting output");
                    FormattedOutput::Unavailable
                }
            }
        } else {
            FormattedOutput::Markup(content)
        }
    }
}

fn build_system_prompt(category: Option<QueryCategory>, needs_graph: bool) -> String {
    if needs_graph {
        return CHART_GUIDANCE.to_string();
    }

    let guidance = category.map(formatting_guidance).unwrap_or("");
    format!(
        "You are an assistant that formats database query results into readable HTML.\n\
         Your task is to analyze the query results and present them in a clear, readable format.\n\
         Use HTML to format the response, with <span style=\"font-weight: bold;\"> tags to highlight important elements.\n\
         If generating a list - make the <li> tags have a left margin of 25px.\n\
         <ul> tags should have a top and bottom margin of 5px.\n\
         For specific instructions on the format that should be presented, see below.\n\n\
         {guidance}\n\n\
         Focus on making the data understandable to non-technical users."
    )
}

fn build_user_prompt(question: &str, rows: &[Row], needs_graph: bool) -> String {
    let results = serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".into());
    let instruction = if needs_graph {
        "by providing a chart specification in the requested JSON format for visualizing this data."
    } else {
        "in a readable way using HTML. Highlight key information with <span style=\"font-weight: bold;\"> tags."
    };
    format!(
        "USER QUESTION: {question}\n\n\
         QUERY RESULTS: {results}\n\n\
         Please format these results {instruction}\n\n\
         Only include the formatted response, no explanations or markdown."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockCompletionClient, PromptStage};
    use serde_json::json;

    fn sample_rows() -> Vec<Row> {
        vec![[("drug".to_string(), json!("Amiodarone"))]
            .into_iter()
            .collect()]
    }

    #[tokio::test]
    async fn prose_mode_returns_markup_verbatim() {
        let html = "<ul><li style=\"margin-left: 25px;\"><span style=\"font-weight: bold;\">Amiodarone</span></li></ul>";
        let client = MockCompletionClient::new().with_formatting(html);
        let formatter = ResultFormatter::new(&client, "o4-mini");

        let out = formatter
            .format("what medications?", &sample_rows(), Some(QueryCategory::Clinical), false)
            .await;
        assert_eq!(out, FormattedOutput::Markup(html.to_string()));
    }

    #[tokio::test]
    async fn chart_mode_parses_spec() {
        let client = MockCompletionClient::new().with_formatting(
            r#"{"type": "pie", "labels": ["M", "F"], "datasets": [{"data": [40, 60]}]}"#,
        );
        let formatter = ResultFormatter::new(&client, "o4-mini");

        let out = formatter
            .format("gender distribution chart", &sample_rows(), Some(QueryCategory::Demographics), true)
            .await;
        assert!(matches!(out, FormattedOutput::Chart(_)));
    }

    #[tokio::test]
    async fn chart_mode_without_parsable_spec_degrades() {
        let client =
            MockCompletionClient::new().with_formatting("Sorry, I cannot chart this.");
        let formatter = ResultFormatter::new(&client, "o4-mini");

        let out = formatter
            .format("chart please", &sample_rows(), None, true)
            .await;
        assert_eq!(out, FormattedOutput::Unavailable);
    }

    #[tokio::test]
    async fn service_failure_degrades_to_unavailable() {
        let client = MockCompletionClient::new().failing_at(PromptStage::Formatting);
        let formatter = ResultFormatter::new(&client, "o4-mini");

        let out = formatter
            .format("anything", &sample_rows(), None, false)
            .await;
        assert_eq!(out, FormattedOutput::Unavailable);
    }

    #[test]
    fn graph_prompt_replaces_prose_prompt() {
        let prose = build_system_prompt(Some(QueryCategory::LabResults), false);
        let chart = build_system_prompt(Some(QueryCategory::LabResults), true);
        assert!(prose.contains("readable HTML"));
        assert!(prose.contains("whitespace for each cell"));
        assert!(chart.contains("Chart.js"));
        assert!(chart.contains("#0d47a1"));
        assert!(!chart.contains("readable HTML"));
    }

    #[test]
    fn discharge_guidance_lists_required_sections() {
        let prompt = build_system_prompt(Some(QueryCategory::DischargeSummary), false);
        for section in [
            "Admission ID",
            "Diagnosis",
            "Hospital Course",
            "Discharge disposition",
            "Follow up instructions",
        ] {
            assert!(prompt.contains(section), "missing section {section}");
        }
    }

    #[test]
    fn user_prompt_embeds_rows_as_json() {
        let prompt = build_user_prompt("meds?", &sample_rows(), false);
        assert!(prompt.contains("Amiodarone"));
        assert!(prompt.contains("USER QUESTION: meds?"));
    }
}
