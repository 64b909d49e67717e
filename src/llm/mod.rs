//! Completion-service seam.
//!
//! Everything that talks to the text-generation provider goes through the
//! `CompletionClient` trait: classification, subject-id extraction, SQL
//! generation, and result formatting. The real implementation is
//! `OpenAiClient`; `MockCompletionClient` stands in for tests.

pub mod openai;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

pub use openai::OpenAiClient;

/// Errors from completion-service calls.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("OpenAI API key is not configured")]
    MissingApiKey,
    #[error("Cannot reach completion service at {0}")]
    Connection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Completion service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Failed to parse completion response: {0}")]
    ResponseParsing(String),
}

/// One completion call: a system prompt, a user prompt, and sampling
/// parameters. The response is the assistant message text, trimmed.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Abstract text-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError>;
}

// ═══════════════════════════════════════════════════════════
// Mock client for tests
// ═══════════════════════════════════════════════════════════

/// Which pipeline stage a prompt belongs to, recognized from distinctive
/// fragments of the stage's system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStage {
    Classify,
    SubjectId,
    SqlGeneration,
    Formatting,
}

impl PromptStage {
    fn recognize(system: &str) -> Self {
        if system.contains("categorizing healthcare queries") {
            Self::Classify
        } else if system.contains("extracts patient IDs") {
            Self::SubjectId
        } else if system.contains("SQLite expert") {
            Self::SqlGeneration
        } else {
            Self::Formatting
        }
    }
}

/// Mock completion client — routes canned responses by prompt stage.
///
/// Stages with no canned response fall back to a shared default queue, then
/// to an empty string. `fail_stage` makes one stage return an API error,
/// for degradation tests.
pub struct MockCompletionClient {
    classify: Option<String>,
    subject_id: Option<String>,
    sql: Option<String>,
    formatting: Option<String>,
    fallback: Mutex<VecDeque<String>>,
    fail_stage: Option<PromptStage>,
    calls: AtomicUsize,
    formatting_calls: AtomicUsize,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            classify: None,
            subject_id: None,
            sql: None,
            formatting: None,
            fallback: Mutex::new(VecDeque::new()),
            fail_stage: None,
            calls: AtomicUsize::new(0),
            formatting_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_classify(mut self, response: &str) -> Self {
        self.classify = Some(response.to_string());
        self
    }

    pub fn with_subject_id(mut self, response: &str) -> Self {
        self.subject_id = Some(response.to_string());
        self
    }

    pub fn with_sql(mut self, response: &str) -> Self {
        self.sql = Some(response.to_string());
        self
    }

    pub fn with_formatting(mut self, response: &str) -> Self {
        self.formatting = Some(response.to_string());
        self
    }

    pub fn with_fallback(self, responses: Vec<&str>) -> Self {
        {
            let mut queue = self.fallback.lock().unwrap();
            queue.extend(responses.into_iter().map(String::from));
        }
        self
    }

    pub fn failing_at(mut self, stage: PromptStage) -> Self {
        self.fail_stage = Some(stage);
        self
    }

    /// Total completion calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that reached the formatting stage.
    pub fn formatting_call_count(&self) -> usize {
        self.formatting_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stage = PromptStage::recognize(request.system);
        if stage == PromptStage::Formatting {
            self.formatting_calls.fetch_add(1, Ordering::SeqCst);
        }

        if self.fail_stage == Some(stage) {
            return Err(CompletionError::Api {
                status: 500,
                body: "mock failure".into(),
            });
        }

        let canned = match stage {
            PromptStage::Classify => self.classify.clone(),
            PromptStage::SubjectId => self.subject_id.clone(),
            PromptStage::SqlGeneration => self.sql.clone(),
            PromptStage::Formatting => self.formatting.clone(),
        };

        if let Some(response) = canned {
            return Ok(response);
        }
        let mut queue = self.fallback.lock().unwrap();
        Ok(queue.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(system: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: "test-model",
            system,
            user: "question",
            temperature: 0.0,
            max_tokens: 50,
        }
    }

    #[tokio::test]
    async fn mock_routes_by_stage() {
        let client = MockCompletionClient::new()
            .with_classify("lab_results")
            .with_sql("SELECT 1");

        let category = client
            .complete(request("You are an expert at categorizing healthcare queries."))
            .await
            .unwrap();
        assert_eq!(category, "lab_results");

        let sql = client
            .complete(request("You are an SQLite expert helping to generate queries."))
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[tokio::test]
    async fn mock_fail_stage_errors_only_that_stage() {
        let client = MockCompletionClient::new()
            .with_classify("clinical")
            .failing_at(PromptStage::SqlGeneration);

        assert!(client
            .complete(request("categorizing healthcare queries"))
            .await
            .is_ok());
        assert!(client
            .complete(request("You are an SQLite expert."))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn mock_counts_formatting_calls() {
        let client = MockCompletionClient::new().with_formatting("<p>hi</p>");
        assert_eq!(client.formatting_call_count(), 0);

        // Unrecognized system prompt routes to the formatting stage.
        client.complete(request("format these rows")).await.unwrap();
        assert_eq!(client.formatting_call_count(), 1);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_fallback_queue_pops_in_order() {
        let client = MockCompletionClient::new().with_fallback(vec!["first", "second"]);
        assert_eq!(client.complete(request("anything")).await.unwrap(), "first");
        assert_eq!(client.complete(request("anything")).await.unwrap(), "second");
        assert_eq!(client.complete(request("anything")).await.unwrap(), "");
    }
}
