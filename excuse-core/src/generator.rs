//! Excuse generation: prompt construction, completion call, first-line
//! extraction and dedup-insert.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::completion::{CompletionBackend, CompletionError};
use crate::models::{Criticality, ProofKind, Scenario};
use crate::store::{ExcuseStore, StoreError};

const HEALTH_CONSTRAINT: &str =
    " The excuse must involve a health issue (e.g., illness, medical emergency, injury).";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Completion service failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Completion service returned no usable excuse")]
    EmptyResponse,

    #[error("Could not store excuse: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedExcuse {
    pub id: i64,
    pub text: String,
}

pub struct ExcuseGenerator {
    backend: Arc<dyn CompletionBackend>,
    store: ExcuseStore,
}

impl ExcuseGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, store: ExcuseStore) -> Self {
        Self { backend, store }
    }

    pub fn store(&self) -> &ExcuseStore {
        &self.store
    }

    /// Generate one excuse and persist it. `proof` is the requested proof kind,
    /// if any; document-style kinds force a health-related excuse.
    pub async fn generate(
        &self,
        scenario: Scenario,
        criticality: Criticality,
        proof: Option<ProofKind>,
    ) -> Result<GeneratedExcuse, GenerationError> {
        let prompt = build_prompt(scenario, criticality, proof);

        tracing::info!(
            backend = self.backend.name(),
            scenario = %scenario,
            criticality = %criticality,
            proof = ?proof,
            "Requesting excuse"
        );

        let raw = self.backend.complete(&prompt).await?;

        let text = match first_line(&raw) {
            Some(line) => line.to_string(),
            None => {
                tracing::warn!("Completion response had no usable first line");
                return Err(GenerationError::EmptyResponse);
            }
        };

        let id = self.store.dedup_insert(&text).await?;

        Ok(GeneratedExcuse { id, text })
    }
}

pub fn build_prompt(scenario: Scenario, criticality: Criticality, proof: Option<ProofKind>) -> String {
    let mut prompt = format!(
        "Write one clear, natural-sounding excuse in 10–25 words for this situation. \
         Do NOT include bullet points, labels, or promises like 'I'll explain when'. \
         Keep it realistic and context-appropriate.\n\
         Scenario: {}. Urgency: {}.",
        scenario, criticality
    );

    if proof.is_some_and(ProofKind::is_document) {
        prompt.push_str(HEALTH_CONSTRAINT);
    }

    prompt
}

/// First line of the trimmed response, trimmed again. `None` when nothing remains.
pub fn first_line(raw: &str) -> Option<&str> {
    let line = raw.trim().lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns canned responses in order and records the prompts it received.
    struct ScriptedBackend {
        responses: Mutex<Vec<Result<String, CompletionError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses.lock().unwrap().remove(0)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    async fn generator_with(backend: Arc<ScriptedBackend>) -> ExcuseGenerator {
        let pool = db::connect_in_memory().await.unwrap();
        db::init_schema(&pool).await.unwrap();
        ExcuseGenerator::new(backend, ExcuseStore::new(pool))
    }

    #[test]
    fn test_prompt_mentions_scenario_and_urgency() {
        let prompt = build_prompt(Scenario::SocialEvent, Criticality::Medium, None);
        assert!(prompt.contains("Scenario: Social Event. Urgency: Medium."));
        assert!(prompt.contains("10–25 words"));
        assert!(prompt.contains("Do NOT include bullet points, labels"));
        assert!(!prompt.contains("health issue"));
    }

    #[test]
    fn test_health_constraint_only_for_document_kinds() {
        for kind in ProofKind::ALL {
            let prompt = build_prompt(Scenario::Office, Criticality::High, Some(kind));
            assert_eq!(prompt.contains("must involve a health issue"), kind.is_document(), "{}", kind);
        }
    }

    #[test]
    fn test_first_line_extraction() {
        assert_eq!(first_line("  My cat knocked my laptop into the bath.  \nHope that helps!"),
            Some("My cat knocked my laptop into the bath."));
        assert_eq!(first_line("\n\n  Flat tyre on the ring road.\n"), Some("Flat tyre on the ring road."));
        assert_eq!(first_line("   \n \t "), None);
        assert_eq!(first_line(""), None);
    }

    #[tokio::test]
    async fn test_generate_stores_first_line() {
        let backend = ScriptedBackend::new(vec![Ok(
            "I woke up with a pounding headache and could not focus.\n\n(Alternative: ...)".to_string(),
        )]);
        let generator = generator_with(backend.clone()).await;

        let excuse = generator
            .generate(Scenario::Office, Criticality::High, Some(ProofKind::Medical))
            .await
            .unwrap();

        assert_eq!(excuse.text, "I woke up with a pounding headache and could not focus.");
        let record = generator.store().get(excuse.id).await.unwrap().unwrap();
        assert_eq!(record.text, excuse.text);
        assert_eq!(record.rating, None);
        assert!(backend.prompts()[0].contains("health issue"));
    }

    #[tokio::test]
    async fn test_repeated_excuse_reuses_record() {
        let backend = ScriptedBackend::new(vec![
            Ok("Same excuse.".to_string()),
            Ok("Same excuse.\nextra".to_string()),
        ]);
        let generator = generator_with(backend).await;

        let a = generator.generate(Scenario::Late, Criticality::Low, None).await.unwrap();
        let b = generator.generate(Scenario::Late, Criticality::Low, None).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_blank_response_fails_without_record() {
        let backend = ScriptedBackend::new(vec![Ok("   \n   ".to_string())]);
        let generator = generator_with(backend).await;

        let result = generator.generate(Scenario::School, Criticality::Low, None).await;
        assert!(matches!(result, Err(GenerationError::EmptyResponse)));
        assert!(generator.store().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_fails_without_record() {
        let backend = ScriptedBackend::new(vec![Err(CompletionError::Timeout { seconds: 30 })]);
        let generator = generator_with(backend).await;

        let result = generator.generate(Scenario::Family, Criticality::Medium, None).await;
        assert!(matches!(
            result,
            Err(GenerationError::Completion(CompletionError::Timeout { .. }))
        ));
        assert!(generator.store().list_recent(10).await.unwrap().is_empty());
    }
}
