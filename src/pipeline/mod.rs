//! Multi-stage documentation pipeline
//!
//! Turns an ingested repository into a documentation bundle through a
//! fixed stage order: comprehensive summary, abstraction list,
//! relationship analysis, chapter plan, introduction, diagrams, chapter
//! bodies. The first five stages are hard requirements and abort the run
//! with the failed stage named; diagrams are fully best-effort; chapter
//! bodies fail soft per item but at least one must succeed.

pub mod chapters;
pub mod diagrams;
pub mod markdown;
pub mod prompts;

pub use chapters::{parse_chapter_plan, ChapterDescriptor};

use crate::gateway::TextGenerator;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The hard-required pipeline stages, named in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Summary,
    Abstractions,
    Relationships,
    ChapterPlan,
    Introduction,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Summary => "comprehensive summary",
            StageKind::Abstractions => "abstractions",
            StageKind::Relationships => "relationships",
            StageKind::ChapterPlan => "chapter structure",
            StageKind::Introduction => "introduction",
        };
        f.write_str(name)
    }
}

/// Failure modes of a documentation run
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// A hard-required stage produced no usable output
    #[error("Failed to generate {0}")]
    Stage(StageKind),
    /// Every chapter body failed
    #[error("Failed to generate any chapters")]
    NoChapters,
}

/// One finished chapter
#[derive(Debug, Clone, serde::Serialize)]
pub struct Chapter {
    pub number: usize,
    pub title: String,
    pub description: String,
    /// Cleaned markdown body, always starting with an `#` heading
    pub content: String,
}

/// Everything a successful documentation run produces
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocBundle {
    pub introduction: String,
    pub chapters: Vec<Chapter>,
    pub diagrams: BTreeMap<String, String>,
    pub summary: String,
    pub abstractions: String,
    pub relationships: String,
}

/// Per-run inputs copied out of the session
pub struct PipelineInputs<'a> {
    pub repo_url: &'a str,
    /// Ingestion summary header, used as a fallback in diagram-only runs
    pub ingest_summary: &'a str,
    pub tree: &'a str,
    pub content: &'a str,
    pub credential: Option<&'a str>,
}

/// Orchestrates documentation and diagram runs against a text generator
pub struct DocPipeline {
    generator: Arc<dyn TextGenerator>,
    prompt_content_limit: usize,
}

impl DocPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, prompt_content_limit: usize) -> Self {
        Self {
            generator,
            prompt_content_limit,
        }
    }

    /// Runs the full pipeline
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Stage`] when a hard-required stage yields
    /// nothing, and [`PipelineError::NoChapters`] when every chapter body
    /// fails.
    pub async fn generate(&self, inputs: &PipelineInputs<'_>) -> Result<DocBundle, PipelineError> {
        tracing::info!(
            "Starting documentation generation for {} | Using: {}",
            inputs.repo_url,
            if inputs.credential.is_some() {
                "User Key"
            } else {
                "System Key"
            }
        );

        let content = diagrams::truncate_middle(inputs.content, self.prompt_content_limit);
        let credential = inputs.credential;

        tracing::info!("Step 1: Generating comprehensive repository summary");
        let summary = self
            .stage(StageKind::Summary, prompts::comprehensive_summary(&content), credential)
            .await?;

        tracing::info!("Step 2: Identifying abstractions");
        let abstractions = self
            .stage(
                StageKind::Abstractions,
                prompts::identify_abstractions(&content),
                credential,
            )
            .await?;

        tracing::info!("Step 3: Analyzing relationships");
        let relationships = self
            .stage(
                StageKind::Relationships,
                prompts::analyze_relationships(&abstractions, &summary),
                credential,
            )
            .await?;

        tracing::info!("Step 4: Creating chapter plan");
        let plan = self
            .stage(
                StageKind::ChapterPlan,
                prompts::chapter_plan(&abstractions, &relationships),
                credential,
            )
            .await?;

        tracing::info!("Step 5: Parsing chapter plan");
        let descriptors = parse_chapter_plan(&plan);

        tracing::info!("Step 6: Creating introduction");
        let introduction = self
            .stage(
                StageKind::Introduction,
                prompts::introduction(&summary, &abstractions, inputs.repo_url),
                credential,
            )
            .await?;

        tracing::info!("Step 7: Generating diagrams");
        let diagram_inputs = diagrams::DiagramInputs {
            repo_url: inputs.repo_url,
            summary: &summary,
            tree: inputs.tree,
            content: inputs.content,
            abstractions: &abstractions,
            relationships: &relationships,
        };
        let bundle_diagrams =
            diagrams::generate_all(self.generator.as_ref(), &diagram_inputs, credential).await;

        tracing::info!("Step 8: Writing {} chapters", descriptors.len());
        let bodies = join_all(descriptors.iter().map(|descriptor| {
            self.write_chapter(
                descriptor,
                &abstractions,
                &relationships,
                &summary,
                inputs.repo_url,
                credential,
            )
        }))
        .await;

        let chapters: Vec<Chapter> = bodies.into_iter().flatten().collect();
        if chapters.is_empty() {
            return Err(PipelineError::NoChapters);
        }

        tracing::info!(
            "Documentation generation completed with {} chapters and {} diagrams",
            chapters.len(),
            bundle_diagrams.len()
        );

        Ok(DocBundle {
            introduction,
            chapters,
            diagrams: bundle_diagrams,
            summary,
            abstractions,
            relationships,
        })
    }

    /// Diagram-only run: regenerates the textual stages with fallbacks,
    /// then produces the diagram bundle
    pub async fn generate_diagram_bundle(
        &self,
        inputs: &PipelineInputs<'_>,
    ) -> BTreeMap<String, String> {
        let content = diagrams::truncate_middle(inputs.content, self.prompt_content_limit);
        let credential = inputs.credential;

        tracing::info!("Generating abstractions for diagrams");
        let abstractions = self
            .generator
            .generate(&prompts::identify_abstractions(&content), credential)
            .await
            .unwrap_or_else(|| "No abstractions identified".to_string());

        tracing::info!("Generating summary for diagrams");
        let summary = self
            .generator
            .generate(&prompts::comprehensive_summary(&content), credential)
            .await
            .unwrap_or_else(|| inputs.ingest_summary.to_string());

        tracing::info!("Analyzing relationships for diagrams");
        let relationships = self
            .generator
            .generate(
                &prompts::analyze_relationships(&abstractions, &summary),
                credential,
            )
            .await
            .unwrap_or_else(|| "No relationships identified".to_string());

        let diagram_inputs = diagrams::DiagramInputs {
            repo_url: inputs.repo_url,
            summary: &summary,
            tree: inputs.tree,
            content: inputs.content,
            abstractions: &abstractions,
            relationships: &relationships,
        };
        diagrams::generate_all(self.generator.as_ref(), &diagram_inputs, credential).await
    }

    /// One hard-required stage: generate, clean, require non-empty
    async fn stage(
        &self,
        kind: StageKind,
        prompt: String,
        credential: Option<&str>,
    ) -> Result<String, PipelineError> {
        let raw = self
            .generator
            .generate(&prompt, credential)
            .await
            .ok_or(PipelineError::Stage(kind))?;
        let cleaned = markdown::clean_markdown(&raw);
        if cleaned.trim().is_empty() {
            return Err(PipelineError::Stage(kind));
        }
        Ok(cleaned)
    }

    async fn write_chapter(
        &self,
        descriptor: &ChapterDescriptor,
        abstractions: &str,
        relationships: &str,
        summary: &str,
        repo_url: &str,
        credential: Option<&str>,
    ) -> Option<Chapter> {
        tracing::info!("Writing Chapter {}: {}", descriptor.number, descriptor.title);
        let prompt =
            prompts::chapter_body(descriptor, abstractions, relationships, summary, repo_url);

        let raw = match self.generator.generate(&prompt, credential).await {
            Some(text) => text,
            None => {
                tracing::warn!("Failed to generate Chapter {}", descriptor.number);
                return None;
            }
        };

        let mut content = markdown::clean_markdown(&raw);
        if !content.trim_start().starts_with('#') {
            content = format!("# {}\n\n{}", descriptor.title, content);
        }

        let report = markdown::validate_markdown(&content);
        if !report.valid {
            tracing::warn!(
                "Chapter {} had markdown issues: {:?}",
                descriptor.number,
                report.issues
            );
        }

        Some(Chapter {
            number: descriptor.number,
            title: descriptor.title.clone(),
            description: descriptor.description.clone(),
            content,
        })
    }
}
