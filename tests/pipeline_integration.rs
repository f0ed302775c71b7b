use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use repodoc::gateway::{ChatMessage, TextGenerator};
use repodoc::pipeline::{DocPipeline, PipelineError, PipelineInputs};

/// Generator scripted by prompt content: each distinguishing phrase maps
/// to a canned reply
struct ScriptedGenerator {
    responder: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _credential: Option<&str>) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(prompt)
    }

    async fn chat(&self, messages: &[ChatMessage], credential: Option<&str>) -> Option<String> {
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        self.generate(prompt, credential).await
    }
}

fn inputs<'a>() -> PipelineInputs<'a> {
    PipelineInputs {
        repo_url: "https://github.com/acme/demo",
        ingest_summary: "Repository: demo",
        tree: "src/main.rs\nREADME.md",
        content: "fn main() {}",
        credential: None,
    }
}

const PLAN: &str = "\
# Documentation Structure

## Chapter 1: Getting Started
Install and run the service.

## Chapter 2: Core Components
The main building blocks.

## Chapter 3: Data Handling
How input becomes output.

## Chapter 4: Deployment
Running in production.
";

/// Responder covering every stage with plausible replies
fn full_responder(prompt: &str) -> Option<String> {
    if prompt.contains("Create a well-structured summary") {
        Some("# Repository Overview\n\nA demo service.".to_string())
    } else if prompt.contains("most important abstractions") {
        Some("# Key Abstractions\n\n## 1. Engine\n- **Description**: runs things".to_string())
    } else if prompt.contains("analyze component relationships") {
        Some("# Component Relationships\n\n## Dependencies\n- Engine -> Store".to_string())
    } else if prompt.contains("EXACTLY 4 chapters") {
        Some(PLAN.to_string())
    } else if prompt.contains("creating the introduction page") {
        Some("# Introduction\n\n## Overview\nWelcome.".to_string())
    } else if prompt.contains("You are writing Chapter") {
        Some("# Chapter Body\n\nExplanations.".to_string())
    } else if prompt.contains("mermaid") {
        Some("flowchart TD\n    A --> B".to_string())
    } else {
        None
    }
}

#[tokio::test]
async fn test_full_run_produces_complete_bundle() {
    let generator = ScriptedGenerator::new(full_responder);
    let pipeline = DocPipeline::new(generator.clone(), 750_000);

    let bundle = pipeline.generate(&inputs()).await.unwrap();

    assert!(bundle.introduction.starts_with("# Introduction"));
    assert_eq!(bundle.chapters.len(), 4);
    assert_eq!(bundle.chapters[0].number, 1);
    assert_eq!(bundle.chapters[0].title, "Getting Started");
    assert_eq!(bundle.chapters[3].title, "Deployment");
    assert_eq!(bundle.diagrams.len(), 5);
    assert!(bundle.diagrams.contains_key("architecture"));
    assert!(bundle.diagrams.contains_key("file_structure"));
    assert!(bundle.summary.contains("Repository Overview"));
}

#[tokio::test]
async fn test_summary_failure_stops_before_downstream_stages() {
    let generator = ScriptedGenerator::new(|_| None);
    let pipeline = DocPipeline::new(generator.clone(), 750_000);

    let err = pipeline.generate(&inputs()).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Stage(repodoc::pipeline::StageKind::Summary)
    ));
    // The failed first stage must be the only remote call
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_relationships_failure_names_the_stage() {
    let generator = ScriptedGenerator::new(|prompt| {
        if prompt.contains("analyze component relationships") {
            None
        } else {
            full_responder(prompt)
        }
    });
    let pipeline = DocPipeline::new(generator, 750_000);

    let err = pipeline.generate(&inputs()).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to generate relationships");
}

#[tokio::test]
async fn test_partial_chapter_failure_keeps_survivors() {
    let generator = ScriptedGenerator::new(|prompt| {
        if prompt.contains("You are writing Chapter 4") {
            None
        } else if prompt.contains("mermaid") {
            // Diagrams are independent of chapter outcomes
            None
        } else {
            full_responder(prompt)
        }
    });
    let pipeline = DocPipeline::new(generator, 750_000);

    let bundle = pipeline.generate(&inputs()).await.unwrap();

    assert_eq!(bundle.chapters.len(), 3);
    let numbers: Vec<usize> = bundle.chapters.iter().map(|c| c.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(bundle.diagrams.is_empty());
}

#[tokio::test]
async fn test_all_chapters_failing_is_an_error() {
    let generator = ScriptedGenerator::new(|prompt| {
        if prompt.contains("You are writing Chapter") {
            None
        } else {
            full_responder(prompt)
        }
    });
    let pipeline = DocPipeline::new(generator, 750_000);

    let err = pipeline.generate(&inputs()).await.unwrap_err();
    assert_eq!(err, PipelineError::NoChapters);
}

#[tokio::test]
async fn test_chapter_body_gets_title_heading_when_missing() {
    let generator = ScriptedGenerator::new(|prompt| {
        if prompt.contains("You are writing Chapter") {
            // Long first line so the cleaner cannot promote it to a heading
            Some(format!("{} and this keeps going for a while without any heading marker at all.", "An untitled body that starts with plain prose"))
        } else {
            full_responder(prompt)
        }
    });
    let pipeline = DocPipeline::new(generator, 750_000);

    let bundle = pipeline.generate(&inputs()).await.unwrap();
    for chapter in &bundle.chapters {
        assert!(
            chapter.content.starts_with(&format!("# {}", chapter.title)),
            "chapter {} missing title heading",
            chapter.number
        );
    }
}

#[tokio::test]
async fn test_diagram_bundle_uses_fallback_texts() {
    // Textual stages fail but diagram prompts succeed: the run degrades
    // instead of aborting
    let generator = ScriptedGenerator::new(|prompt| {
        if prompt.contains("mermaid") {
            Some("graph TD\n    A --> B".to_string())
        } else {
            None
        }
    });
    let pipeline = DocPipeline::new(generator, 750_000);

    let diagrams = pipeline.generate_diagram_bundle(&inputs()).await;
    assert_eq!(diagrams.len(), 5);
}

#[tokio::test]
async fn test_diagram_bundle_discards_invalid_mermaid() {
    let generator = ScriptedGenerator::new(|prompt| {
        if prompt.contains("mermaid") {
            Some("Sorry, I cannot draw that.".to_string())
        } else {
            full_responder(prompt)
        }
    });
    let pipeline = DocPipeline::new(generator, 750_000);

    let diagrams = pipeline.generate_diagram_bundle(&inputs()).await;
    assert!(diagrams.is_empty());
}
