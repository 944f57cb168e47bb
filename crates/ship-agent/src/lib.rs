//! # ship-agent
//!
//! Artifact generation for shipwright.
//!
//! A [`TextModel`] turns a prompt into text; [`GeminiClient`] is the
//! production model. [`LlmArtifactGenerator`] builds the prompts for the
//! three generation operations, feeds decoded attachments into them and
//! cleans the model's output.
//!
//! Each call is stateless: no conversation history is kept between the
//! markup, description and revision requests.

mod attachments;
mod auth;
mod client;
mod generator;
mod output;
mod prompt;
mod types;

pub use attachments::{decode_attachments, decode_data_url, DecodedAttachment};
pub use auth::resolve_api_key;
pub use client::GeminiClient;
pub use generator::{fallback_description, ArtifactGenerator, LlmArtifactGenerator, TextModel};
pub use output::clean_llm_output;
pub use prompt::{description_prompt, markup_prompt, revision_prompt};
pub use types::Usage;
