//! Shared state for the API layer.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::llm::{CompletionClient, OpenAiClient};
use crate::pipeline::context::PatientContext;
use crate::pipeline::orchestrator::Orchestrator;
use crate::schema::{SchemaError, SchemaProvider};
use crate::store::QueryExecutor;

/// Request timeout for the completion service, generous enough for the
/// large formatting responses.
const COMPLETION_TIMEOUT_SECS: u64 = 120;

/// Shared context for all API routes.
///
/// The conversation context is process-wide: one active patient per server,
/// matching a single-clinician session. The async mutex also serializes
/// full-turn runs so two concurrent questions cannot interleave their
/// context updates.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub completion: Arc<dyn CompletionClient>,
    pub orchestrator: Arc<Orchestrator>,
    pub conversation: Arc<Mutex<PatientContext>>,
}

impl ApiContext {
    /// Build the context from configuration, using the real completion
    /// client.
    pub fn from_config(config: AppConfig) -> Result<Self, SchemaError> {
        let completion: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(
            &config.completion_url,
            config.api_key.clone(),
            COMPLETION_TIMEOUT_SECS,
        ));
        Self::with_client(config, completion)
    }

    /// Build the context with an explicit completion client. Tests inject a
    /// mock here.
    pub fn with_client(
        config: AppConfig,
        completion: Arc<dyn CompletionClient>,
    ) -> Result<Self, SchemaError> {
        let schema = SchemaProvider::load(config.schema_path.as_deref())?;
        let executor = QueryExecutor::new(config.database_path.clone());
        let orchestrator = Orchestrator::new(
            completion.clone(),
            schema,
            executor,
            config.generation_model.clone(),
            config.detection_model.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            completion,
            orchestrator: Arc::new(orchestrator),
            conversation: Arc::new(Mutex::new(PatientContext::default())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;

    #[test]
    fn with_client_starts_with_empty_conversation() {
        let ctx = ApiContext::with_client(
            AppConfig::default(),
            Arc::new(MockCompletionClient::new()),
        )
        .unwrap();
        let conversation = ctx.conversation.try_lock().unwrap();
        assert_eq!(*conversation, PatientContext::default());
    }

    #[test]
    fn from_config_builds_real_client() {
        let ctx = ApiContext::from_config(AppConfig::default()).unwrap();
        assert!(ctx.config.api_key.is_none());
    }
}
