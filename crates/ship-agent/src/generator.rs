//! Artifact Generator
//!
//! Produces the markup document and README for a brief, and revises an
//! existing markup document. Markup failures are fatal to a run; the README
//! falls back to a minimal template when the service fails.

use async_trait::async_trait;
use ship_core::{Attachment, Result, ShipError};
use tracing::{info, warn};

use crate::attachments::decode_attachments;
use crate::output::clean_llm_output;
use crate::prompt::{description_prompt, markup_prompt, revision_prompt};

/// A prompt-in, text-out generative model
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// The three generation operations the orchestrator needs
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate_markup(&self, brief: &str, attachments: &[Attachment]) -> Result<String>;

    async fn generate_description(&self, brief: &str, repo_name: &str) -> Result<String>;

    async fn revise_markup(
        &self,
        existing: &str,
        brief: &str,
        attachments: &[Attachment],
    ) -> Result<String>;
}

/// README used when the service cannot produce one
pub fn fallback_description(brief: &str, repo_name: &str) -> String {
    format!(
        "# {}\n\nThis project was generated based on the brief: {}",
        repo_name, brief
    )
}

/// Generator backed by any [`TextModel`]
#[derive(Debug, Clone)]
pub struct LlmArtifactGenerator<M: TextModel> {
    model: M,
}

impl<M: TextModel> LlmArtifactGenerator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run a prompt and return cleaned, non-empty output
    async fn complete_clean(&self, prompt: &str, what: &str) -> Result<String> {
        let raw = self.model.complete(prompt).await?;
        let cleaned = clean_llm_output(&raw);
        if cleaned.is_empty() {
            return Err(ShipError::Generation(format!(
                "Generative service returned empty {}",
                what
            )));
        }
        Ok(cleaned)
    }
}

#[async_trait]
impl<M: TextModel> ArtifactGenerator for LlmArtifactGenerator<M> {
    async fn generate_markup(&self, brief: &str, attachments: &[Attachment]) -> Result<String> {
        info!("Generating markup from brief ({} attachments)", attachments.len());
        let decoded = decode_attachments(attachments);
        self.complete_clean(&markup_prompt(brief, &decoded), "markup")
            .await
    }

    async fn generate_description(&self, brief: &str, repo_name: &str) -> Result<String> {
        info!("Generating README for {}", repo_name);
        match self
            .complete_clean(&description_prompt(brief, repo_name), "README")
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("README generation failed, using fallback: {}", e);
                Ok(fallback_description(brief, repo_name))
            }
        }
    }

    async fn revise_markup(
        &self,
        existing: &str,
        brief: &str,
        attachments: &[Attachment],
    ) -> Result<String> {
        info!("Revising markup ({} existing chars)", existing.len());
        let decoded = decode_attachments(attachments);
        self.complete_clean(&revision_prompt(existing, brief, &decoded), "revision")
            .await
    }
}
