//! SQL generation and extraction.
//!
//! The generator composes a schema-grounded, category-specialized prompt
//! and returns the service's raw text. `parse_sql` then pulls the bare
//! statement out of that text. Generation is best-effort and not
//! deterministic; syntactic correctness is discovered only at execution.

use std::sync::OnceLock;

use regex::Regex;

use crate::llm::{CompletionClient, CompletionError, CompletionRequest};
use crate::pipeline::category::QueryCategory;
use crate::pipeline::context::PatientContext;
use crate::schema::SchemaProvider;

/// Extract a bare SQL statement from generation output.
///
/// A fenced code block (optionally tagged `sql`) yields its trimmed
/// interior; anything else is returned whole, trimmed. Idempotent: already
/// bare SQL passes through unchanged. No validation happens here.
pub fn parse_sql(input: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:sql)?\s*(.*?)\s*```").unwrap());

    match fence.captures(input) {
        Some(caps) => caps[1].trim().to_string(),
        None => input.trim().to_string(),
    }
}

/// Category-specific guidance for the SQL-generation pass.
///
/// Deliberately kept separate from the formatting pass's guidance — the two
/// passes are tuned independently.
fn generation_guidance(category: QueryCategory) -> &'static str {
    match category {
        QueryCategory::DischargeSummary => {
            "This is a discharge summary query. Fetch the most recent admission for a patient first, \
             then use that admission id for all other queries.\n\
             Always use the subject_id provided and the most recent admission id (hadm_id) to filter relevant queries.\n\
             Focus on retrieving comprehensive patient information.\n\n\
             Follow this format and methods to fetch the relevant data:\n\
             Admission Date: use the admissions table filtered by subject_id to get the admission date.\n\
             Discharge Date: use the admissions table filtered by subject_id to get the discharge date.\n\n\
             Include the following sections in the discharge summary:\n\
             Medications, procedures, diagnoses, physician orders."
        }
        QueryCategory::LabResults => {
            "When asked about lab results - you need to use the labevents table with the subject_id \
             to fetch the relevant rows.\n\
             Then use the itemid to join with d_labitems to get the item name (using the label column).\n\
             Using the label, you can then use columns valuenum and valueuom to get the numeric value \
             and unit of the lab result from the labevents table.\n\n\
             This is a lab results query for an individual patient. Focus on the labevents table \
             and join with d_labitems to get meaningful labels. Include valueuom (units of measure) \
             in the results and sort by charttime to show chronological progression."
        }
        QueryCategory::Demographics => {
            "This is a demographics query about the hospital population. Focus on aggregate functions \
             (COUNT, AVG, etc.) and grouping to provide statistical insights. Consider including \
             breakdowns by age, gender, ethnicity, or other demographic factors."
        }
        QueryCategory::Administrative => {
            "This is an administrative query about hospital operations. Focus on bed occupancy, \
             patient transfers, length of stay, or service transitions. Include date/time information \
             and consider trends over time.\n\n\
             If asked about patient transfers - you need to use the admissions table and the services table."
        }
        QueryCategory::Procedures => {
            "This is a query about procedures for a specific patient. Focus on the procedures_icd table \
             and join with d_icd_procedures to get procedure names. Include dates and other relevant \
             clinical context."
        }
        QueryCategory::Clinical => "This is a clinical query about a specific patient.",
    }
}

/// General join examples and SQLite caveats, appended to every prompt.
const GENERAL_GUIDE: &str = "\
For all queries, always review the schema carefully to ensure you are using the correct table and column names.

As a general guide for how this database works, here are some examples:
Diagnoses: use the diagnoses_icd table filtered by subject_id joined with d_icd_diagnoses by icd_code to get the diagnosis name.
Procedures: use the procedures_icd table filtered by subject_id and ordered by seq_num, joined with d_icd_procedures by icd_code to get the procedure names.
Physician Orders: always join the poe_detail table with the poe table first. Use the poe_detail table filtered by subject_id, ordered by poe_seq, to retrieve the relevant physician orders.
Medications: filter the prescriptions table by subject_id and hadm_id to get the relevant medications.

Based on this schema and the following user question, please generate a valid SQLite query for the natural language request.
Remember, SQLite does not support using DISTINCT and a custom separator together in group_concat().
If you need DISTINCT and want a custom separator, use a subquery to remove duplicates first, then group_concat.";

/// Composes the generation prompt and invokes the completion service.
pub struct SqlGenerator<'a> {
    client: &'a dyn CompletionClient,
    model: &'a str,
    schema: &'a SchemaProvider,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(
        client: &'a dyn CompletionClient,
        model: &'a str,
        schema: &'a SchemaProvider,
    ) -> Self {
        Self {
            client,
            model,
            schema,
        }
    }

    /// Generate raw SQL text for a question. The caller runs the result
    /// through `parse_sql` before execution.
    pub async fn generate(
        &self,
        question: &str,
        category: Option<QueryCategory>,
        context: &PatientContext,
    ) -> Result<String, CompletionError> {
        let system = self.build_system_prompt(category, context);
        let user = format!(
            "USER QUESTION: {}\n\n\
             Please respond with only the SQL query without any explanation. \
             The query should be valid SQLite syntax.",
            question.trim()
        );

        self.client
            .complete(CompletionRequest {
                model: self.model,
                system: &system,
                user: &user,
                temperature: 1.0,
                max_tokens: 5000,
            })
            .await
    }

    fn build_system_prompt(
        &self,
        category: Option<QueryCategory>,
        context: &PatientContext,
    ) -> String {
        let mut prompt = format!(
            "You are an SQLite expert helping to generate valid SQLite queries based on a natural language question.\n\n\
             Here is the database schema information:\n{}\n",
            self.schema.text()
        );

        if let Some(category) = category {
            prompt.push('\n');
            prompt.push_str(generation_guidance(category));
            prompt.push('\n');
        }

        if let Some(line) = context.prompt_line() {
            prompt.push('\n');
            prompt.push_str(&line);
            prompt.push('\n');
        }

        prompt.push('\n');
        prompt.push_str(GENERAL_GUIDE);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;

    #[test]
    fn parse_sql_extracts_tagged_fence() {
        let input = "Here is your query:\n```sql\nSELECT * FROM patients;\n```\nHope it helps!";
        assert_eq!(parse_sql(input), "SELECT * FROM patients;");
    }

    #[test]
    fn parse_sql_extracts_untagged_fence() {
        let input = "```\nSELECT count(*) FROM admissions\n```";
        assert_eq!(parse_sql(input), "SELECT count(*) FROM admissions");
    }

    #[test]
    fn parse_sql_without_fence_trims_whole_input() {
        assert_eq!(
            parse_sql("  SELECT 1  \n"),
            "SELECT 1"
        );
    }

    #[test]
    fn parse_sql_is_idempotent() {
        let input = "```sql\nSELECT gender, count(*) FROM patients GROUP BY gender\n```";
        let once = parse_sql(input);
        assert_eq!(parse_sql(&once), once);
    }

    #[test]
    fn parse_sql_select_is_not_mistaken_for_tag() {
        // `select` starts with 's' like `sql`; the optional tag must not eat it
        let input = "```select * from patients```";
        assert_eq!(parse_sql(input), "select * from patients");
    }

    #[tokio::test]
    async fn prompt_carries_schema_guidance_and_context() {
        let client = MockCompletionClient::new().with_sql("SELECT 1");
        let schema = SchemaProvider::builtin();
        let generator = SqlGenerator::new(&client, "o4-mini", &schema);

        let mut context = PatientContext::default();
        context.observe_subject(Some("10009628"));
        context.observe_admission(Some("25926192"));

        let system =
            generator.build_system_prompt(Some(QueryCategory::LabResults), &context);
        assert!(system.contains("SQLite expert"));
        assert!(system.contains("labevents"));
        assert!(system.contains("d_labitems"));
        assert!(system.contains("10009628"));
        assert!(system.contains("25926192"));
        assert!(system.contains("group_concat"));

        let sql = generator
            .generate("show labs for patient 10009628", Some(QueryCategory::LabResults), &context)
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn unclassified_prompt_omits_category_guidance() {
        let client = MockCompletionClient::new();
        let schema = SchemaProvider::builtin();
        let generator = SqlGenerator::new(&client, "o4-mini", &schema);

        let system = generator.build_system_prompt(None, &PatientContext::default());
        assert!(!system.contains("discharge summary query"));
        assert!(!system.contains("ACTIVE PATIENT CONTEXT"));
        assert!(system.contains("group_concat"));
    }

    #[test]
    fn each_category_has_distinct_guidance() {
        let texts: Vec<&str> = QueryCategory::ALL
            .iter()
            .map(|c| generation_guidance(*c))
            .collect();
        for (i, a) in texts.iter().enumerate() {
            for b in texts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
