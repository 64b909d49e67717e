//! Query intent classification.
//!
//! Maps a question to one of six fixed categories via the completion
//! service. Short questions are never sent to the service; unrecognized
//! service output is normalized by substring containment and, failing that,
//! falls back to `Demographics`. Once the classifier is invoked it always
//! yields one of the six variants — never an arbitrary string.

use serde::{Deserialize, Serialize};

use crate::llm::{CompletionClient, CompletionError, CompletionRequest};

/// Questions shorter than this are left unclassified.
pub const MIN_CLASSIFY_LEN: usize = 15;

/// Fixed set of query intents. Drives prompt specialization in both the
/// SQL-generation and formatting passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    DischargeSummary,
    LabResults,
    Demographics,
    Administrative,
    Procedures,
    Clinical,
}

impl QueryCategory {
    /// All variants, in the order substring matching consults them.
    pub const ALL: [QueryCategory; 6] = [
        QueryCategory::DischargeSummary,
        QueryCategory::LabResults,
        QueryCategory::Demographics,
        QueryCategory::Administrative,
        QueryCategory::Procedures,
        QueryCategory::Clinical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::DischargeSummary => "discharge_summary",
            QueryCategory::LabResults => "lab_results",
            QueryCategory::Demographics => "demographics",
            QueryCategory::Administrative => "administrative",
            QueryCategory::Procedures => "procedures",
            QueryCategory::Clinical => "clinical",
        }
    }

    /// Exact match against the six literals.
    pub fn from_literal(s: &str) -> Option<QueryCategory> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Normalize raw classifier output to a category.
    ///
    /// Lowercase + trim, exact match first, then first substring hit in
    /// declaration order ("this is a lab_results query" → `LabResults`),
    /// then the fixed `Demographics` fallback.
    pub fn normalize(raw: &str) -> QueryCategory {
        let cleaned = raw.trim().to_lowercase();
        if let Some(exact) = Self::from_literal(&cleaned) {
            return exact;
        }
        for candidate in Self::ALL {
            if cleaned.contains(candidate.as_str()) {
                return candidate;
            }
        }
        QueryCategory::Demographics
    }
}

impl std::fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are an expert at categorizing healthcare queries.
Your task is to analyze a user's question about hospital data and classify it into one of these categories:

1. discharge_summary: If the user is asking for a discharge summary or comprehensive patient report
2. lab_results: If the user is asking for lab results for an individual patient
3. demographics: If the user is asking general questions about the hospital population
4. administrative: If the user is asking about hospital bed occupancy, transit between services, etc.
5. procedures: If the user is asking specific questions about 1 patient's procedures
6. clinical: If the user is asking any other questions unrelated to lab results or procedures about clinical care for a specific patient

Respond with ONLY the category name, without any additional text or explanation.";

/// Classifies questions through the completion service.
pub struct QueryClassifier<'a> {
    client: &'a dyn CompletionClient,
    model: &'a str,
}

impl<'a> QueryClassifier<'a> {
    pub fn new(client: &'a dyn CompletionClient, model: &'a str) -> Self {
        Self { client, model }
    }

    /// Classify a question. Returns `None` without invoking the service
    /// when the trimmed question is below `MIN_CLASSIFY_LEN`.
    pub async fn classify(
        &self,
        question: &str,
    ) -> Result<Option<QueryCategory>, CompletionError> {
        let trimmed = question.trim();
        if trimmed.len() < MIN_CLASSIFY_LEN {
            return Ok(None);
        }

        let user = format!(
            "USER QUESTION: {trimmed}\n\n\
             Please categorize this question into one of these types: \
             discharge_summary, lab_results, demographics, administrative, procedures, clinical."
        );

        let raw = self
            .client
            .complete(CompletionRequest {
                model: self.model,
                system: CLASSIFY_SYSTEM_PROMPT,
                user: &user,
                temperature: 0.3,
                max_tokens: 50,
            })
            .await?;

        let category = QueryCategory::normalize(&raw);
        tracing::debug!(raw = %raw, category = %category, "Classified query");
        Ok(Some(category))
    }
}
