//! Per-turn pipeline sequencing.
//!
//! One turn moves through a fixed set of phases. Classification, subject-id
//! extraction, and graph-intent evaluation are independent and run
//! concurrently; everything after them is sequential. Detector failures
//! degrade (unclassified / no identifier); SQL generation and execution
//! failures are terminal for the turn.
//!
//! The orchestrator never owns conversation state: the caller passes the
//! `PatientContext` in and receives the updated value back with the
//! response envelope.

use std::sync::Arc;

use serde::Serialize;

use crate::llm::{CompletionClient, CompletionError};
use crate::pipeline::category::{QueryCategory, QueryClassifier};
use crate::pipeline::chart::ChartSpec;
use crate::pipeline::context::{
    admission_id_from_rows, admission_id_from_sql, subject_id_from_rows, PatientContext,
};
use crate::pipeline::format::{FormattedOutput, ResultFormatter};
use crate::pipeline::graph;
use crate::pipeline::sql::{parse_sql, SqlGenerator};
use crate::pipeline::subject::SubjectIdExtractor;
use crate::schema::SchemaProvider;
use crate::store::{ExecutionResult, QueryExecutor, Row, StoreError};

/// Pipeline phase, carried in structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Classifying,
    Extracting,
    Generating,
    Executing,
    Formatting,
    Complete,
    Failed,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Extracting => "extracting",
            Self::Generating => "generating",
            Self::Executing => "executing",
            Self::Formatting => "formatting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Input for one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub question: String,
    /// Category already detected by the caller (e.g. the classify
    /// endpoint). When present, the classification call is skipped.
    pub category_hint: Option<QueryCategory>,
    /// Explicit graph toggle. Wins over keyword detection.
    pub graph_toggle: bool,
}

/// Unrecoverable turn failures, reachable from the generating and
/// executing phases only.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Failed to generate SQL query: {0}")]
    Generation(#[from] CompletionError),
    #[error("SQL execution failed: {message}")]
    Execution { message: String, sql: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-turn output, serialized with the wire field names. At most one of
/// `formatted_html` / `chart_data` is set, decided by the graph flag.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub data: Vec<Row>,
    pub sql: String,
    #[serde(rename = "originalQuery")]
    pub original_query: String,
    #[serde(rename = "queryType", skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryCategory>,
    #[serde(rename = "formattedHtml", skip_serializing_if = "Option::is_none")]
    pub formatted_html: Option<String>,
    #[serde(rename = "chartData", skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartSpec>,
    #[serde(rename = "extractedSubjectId", skip_serializing_if = "Option::is_none")]
    pub extracted_subject_id: Option<String>,
    #[serde(rename = "extractedAdmissionId", skip_serializing_if = "Option::is_none")]
    pub extracted_admission_id: Option<String>,
}

/// Sequences the pipeline for one conversation turn.
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    schema: SchemaProvider,
    executor: QueryExecutor,
    generation_model: String,
    detection_model: String,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        schema: SchemaProvider,
        executor: QueryExecutor,
        generation_model: String,
        detection_model: String,
    ) -> Self {
        Self {
            client,
            schema,
            executor,
            generation_model,
            detection_model,
        }
    }

    /// Run one turn. Returns the response envelope and the updated
    /// patient context; on failure the caller keeps its previous context.
    pub async fn run_turn(
        &self,
        request: &TurnRequest,
        context: PatientContext,
    ) -> Result<(ResponseEnvelope, PatientContext), TurnError> {
        let question = request.question.trim();
        let needs_graph = graph::needs_graph(question, request.graph_toggle);

        // Classifying + Extracting run concurrently; both degrade on error.
        tracing::debug!(phase = %TurnPhase::Classifying, needs_graph, "Turn started");
        let classifier = QueryClassifier::new(&*self.client, &self.detection_model);
        let extractor = SubjectIdExtractor::new(&*self.client, &self.detection_model);

        let classify = async {
            match request.category_hint {
                Some(hint) => Some(hint),
                None => match classifier.classify(question).await {
                    Ok(category) => category,
                    Err(e) => {
                        tracing::warn!(phase = %TurnPhase::Classifying, error = %e, "Classification degraded to unclassified");
                        None
                    }
                },
            }
        };
        let extract = async {
            match extractor.extract(question).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(phase = %TurnPhase::Extracting, error = %e, "Extraction degraded to no identifier");
                    None
                }
            }
        };
        let (category, spoken_subject_id) = tokio::join!(classify, extract);

        tracing::debug!(phase = %TurnPhase::Generating, category = ?category);
        let generator = SqlGenerator::new(&*self.client, &self.generation_model, &self.schema);
        let raw = generator.generate(question, category, &context).await?;
        let sql = parse_sql(&raw);
        tracing::info!(sql = %sql, "Generated SQL");

        tracing::debug!(phase = %TurnPhase::Executing);
        let rows = match self.executor.run(&sql)? {
            ExecutionResult::Rows(rows) => rows,
            ExecutionResult::Failure { message, sql } => {
                tracing::warn!(phase = %TurnPhase::Failed, error = %message);
                return Err(TurnError::Execution { message, sql });
            }
        };

        tracing::debug!(phase = %TurnPhase::Formatting, rows = rows.len());
        let formatter = ResultFormatter::new(&*self.client, &self.generation_model);
        let formatted = formatter.format(question, &rows, category, needs_graph).await;
        let (formatted_html, chart_data) = match formatted {
            FormattedOutput::Markup(html) => (Some(html), None),
            FormattedOutput::Chart(spec) => (None, Some(spec)),
            FormattedOutput::Unavailable => (None, None),
        };

        // Identifier recovery from the result. The SQL-text admission
        // fallback applies only when the rows carry none.
        let row_subject_id = subject_id_from_rows(&rows);
        let row_admission_id =
            admission_id_from_rows(&rows).or_else(|| admission_id_from_sql(&sql));

        let mut updated = context;
        updated.observe_subject(spoken_subject_id.as_deref());
        if category == Some(QueryCategory::DischargeSummary) {
            updated.observe_subject(row_subject_id.as_deref());
            updated.observe_admission(row_admission_id.as_deref());
        }

        tracing::debug!(phase = %TurnPhase::Complete);
        let envelope = ResponseEnvelope {
            data: rows,
            sql,
            original_query: question.to_string(),
            query_type: category,
            formatted_html,
            chart_data,
            extracted_subject_id: row_subject_id,
            extracted_admission_id: row_admission_id,
        };
        Ok((envelope, updated))
    }
}
