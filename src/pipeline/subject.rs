//! Patient identifier extraction.
//!
//! Asks the completion service for a bare numeric identifier or the literal
//! "null", then validates the answer. An absent identifier is a normal
//! outcome, never an error, and never clears a previously known identifier
//! (that rule lives in `PatientContext`).

use crate::llm::{CompletionClient, CompletionError, CompletionRequest};

/// Questions shorter than this are never sent for extraction.
/// Independent of the classifier's threshold.
pub const MIN_EXTRACT_LEN: usize = 10;

const EXTRACT_SYSTEM_PROMPT: &str = "\
You are a healthcare system assistant that extracts patient IDs (subject_id) from user queries.
When a user mentions a patient by their ID, extract the ID and respond with only the ID number.

Examples of messages that contain subject_ids:
- \"Show me labs for patient 12345\" -> \"12345\"
- \"What's the diagnosis for subject_id 54321?\" -> \"54321\"
- \"Get the discharge summary for patient ID 98765\" -> \"98765\"
- \"I need information about the patient with ID 10293\" -> \"10293\"

If the query doesn't contain a specific subject_id, respond with \"null\".
Your response should be exactly the ID number or \"null\", nothing else.";

/// Detects a patient identifier mentioned in a question.
pub struct SubjectIdExtractor<'a> {
    client: &'a dyn CompletionClient,
    model: &'a str,
}

impl<'a> SubjectIdExtractor<'a> {
    pub fn new(client: &'a dyn CompletionClient, model: &'a str) -> Self {
        Self { client, model }
    }

    /// Extract the subject id mentioned in a question, if any.
    ///
    /// Returns `Ok(None)` for short questions (service not invoked), for
    /// the literal "null", and for anything that fails the numeric check.
    pub async fn extract(&self, question: &str) -> Result<Option<String>, CompletionError> {
        let trimmed = question.trim();
        if trimmed.len() < MIN_EXTRACT_LEN {
            return Ok(None);
        }

        let user = format!(
            "User query: \"{trimmed}\"\n\n\
             Extract any patient/subject ID mentioned in this query. \
             Return only the ID number or \"null\" if none exists."
        );

        let raw = self
            .client
            .complete(CompletionRequest {
                model: self.model,
                system: EXTRACT_SYSTEM_PROMPT,
                user: &user,
                temperature: 0.0,
                max_tokens: 50,
            })
            .await?;

        let id = validate_subject_id(&raw);
        tracing::debug!(raw = %raw, id = ?id, "Subject-id extraction");
        Ok(id)
    }
}

/// "null" or anything non-numeric means "no identifier found".
fn validate_subject_id(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"');
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
        return None;
    }
    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;

    #[test]
    fn validate_accepts_numeric_strings() {
        assert_eq!(validate_subject_id("12345"), Some("12345".into()));
        assert_eq!(validate_subject_id(" \"10009628\" "), Some("10009628".into()));
    }

    #[test]
    fn validate_rejects_null_and_non_numeric() {
        assert_eq!(validate_subject_id("null"), None);
        assert_eq!(validate_subject_id("NULL"), None);
        assert_eq!(validate_subject_id("patient 123"), None);
        assert_eq!(validate_subject_id("12.5"), None);
        assert_eq!(validate_subject_id(""), None);
    }

    #[tokio::test]
    async fn extracts_id_from_question() {
        let client = MockCompletionClient::new().with_subject_id("12345");
        let extractor = SubjectIdExtractor::new(&client, "gpt-4o-mini");

        let id = extractor
            .extract("Show me labs for patient 12345")
            .await
            .unwrap();
        assert_eq!(id, Some("12345".into()));
    }

    #[tokio::test]
    async fn question_without_id_yields_none() {
        let client = MockCompletionClient::new().with_subject_id("null");
        let extractor = SubjectIdExtractor::new(&client, "gpt-4o-mini");

        let id = extractor
            .extract("What is the average length of stay?")
            .await
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn short_question_skips_the_service() {
        let client = MockCompletionClient::new().with_subject_id("12345");
        let extractor = SubjectIdExtractor::new(&client, "gpt-4o-mini");

        let id = extractor.extract("labs 123").await.unwrap();
        assert_eq!(id, None);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn chatty_service_output_is_rejected() {
        let client =
            MockCompletionClient::new().with_subject_id("The patient ID is 12345.");
        let extractor = SubjectIdExtractor::new(&client, "gpt-4o-mini");

        let id = extractor
            .extract("Show me labs for patient 12345")
            .await
            .unwrap();
        assert_eq!(id, None);
    }
}
