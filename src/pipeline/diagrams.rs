//! Mermaid diagram generation and repair
//!
//! Five diagram kinds are generated concurrently, each from its own
//! prompt. Model output is unreliable mermaid: wrapped in markdown
//! fences, sprinkled with illegal node IDs and half-formed arrows. The
//! cleaning pass extracts the code, applies deterministic repairs, and
//! discards anything that still does not start with a known diagram
//! type. Every diagram is best-effort; a failed one is simply absent
//! from the bundle.

use crate::gateway::TextGenerator;
use crate::pipeline::prompts;
use regex::Regex;
use std::collections::BTreeMap;

/// First-line keywords accepted by the validator
const VALID_STARTS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "erDiagram",
];

/// Content ceiling for the architecture prompt; middle-truncated beyond it
const MAX_DIAGRAM_CONTENT_CHARS: usize = 500_000;

/// Inputs shared by the diagram generators
pub struct DiagramInputs<'a> {
    pub repo_url: &'a str,
    pub summary: &'a str,
    pub tree: &'a str,
    pub content: &'a str,
    pub abstractions: &'a str,
    pub relationships: &'a str,
}

/// Generates all five diagrams concurrently and returns the successful
/// subset keyed by kind
pub async fn generate_all(
    generator: &dyn TextGenerator,
    inputs: &DiagramInputs<'_>,
    credential: Option<&str>,
) -> BTreeMap<String, String> {
    let content = truncate_middle(inputs.content, MAX_DIAGRAM_CONTENT_CHARS);

    let architecture = generate_one(
        generator,
        prompts::architecture_diagram(inputs.repo_url, inputs.summary, inputs.tree, &content),
        credential,
    );
    let data_flow = generate_one(
        generator,
        prompts::data_flow_diagram(
            inputs.repo_url,
            inputs.summary,
            inputs.abstractions,
            inputs.relationships,
        ),
        credential,
    );
    let components = generate_one(
        generator,
        prompts::component_diagram(inputs.abstractions, inputs.relationships),
        credential,
    );
    let sequence = generate_one(
        generator,
        prompts::sequence_diagram(inputs.repo_url, inputs.abstractions, inputs.relationships),
        credential,
    );
    let file_structure = generate_one(
        generator,
        prompts::file_structure_diagram(inputs.tree),
        credential,
    );

    let (architecture, data_flow, components, sequence, file_structure) =
        tokio::join!(architecture, data_flow, components, sequence, file_structure);

    let mut diagrams = BTreeMap::new();
    for (kind, result) in [
        ("architecture", architecture),
        ("data_flow", data_flow),
        ("components", components),
        ("sequence", sequence),
        ("file_structure", file_structure),
    ] {
        match result {
            Some(code) => {
                tracing::info!("Generated {} diagram", kind);
                diagrams.insert(kind.to_string(), code);
            }
            None => tracing::warn!("Skipping {} diagram", kind),
        }
    }
    diagrams
}

async fn generate_one(
    generator: &dyn TextGenerator,
    prompt: String,
    credential: Option<&str>,
) -> Option<String> {
    let raw = generator.generate(&prompt, credential).await?;
    let cleaned = clean_mermaid(&raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Extracts, repairs, and validates mermaid code from a model reply
///
/// Returns an empty string when nothing salvageable remains.
pub fn clean_mermaid(raw: &str) -> String {
    let extracted = extract_code(raw);
    if extracted.trim().is_empty() {
        return String::new();
    }

    let repaired = fix_syntax(&extracted);
    let repaired = post_process(&repaired);

    if !is_valid_diagram(&repaired) {
        tracing::warn!(
            "Discarding mermaid diagram that failed validation: {}",
            repaired.lines().next().unwrap_or("")
        );
        return String::new();
    }
    repaired
}

/// Pulls the content of fenced blocks out of a reply, or returns the
/// reply unchanged when it has no fences
fn extract_code(raw: &str) -> String {
    let lines: Vec<&str> = raw.trim().lines().collect();
    let mut collected: Vec<&str> = Vec::new();
    let mut in_block = false;
    let mut saw_fence = false;

    for line in &lines {
        if line.trim().starts_with("```") {
            in_block = !in_block;
            saw_fence = true;
            continue;
        }
        if in_block {
            collected.push(line);
        }
    }

    if !saw_fence {
        return raw.trim().to_string();
    }
    collected.join("\n").trim().to_string()
}

/// Line-by-line repairs: arrow syntax, node-id characters, subgraph
/// spacing
fn fix_syntax(text: &str) -> String {
    let arrow_re = Regex::new(r"(\w+)\s*-->\s*(\w+)").unwrap();
    let lines: Vec<&str> = text.split('\n').collect();
    let mut fixed: Vec<String> = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let stripped = raw.trim();
        if stripped.is_empty() {
            fixed.push(raw.to_string());
            continue;
        }

        if stripped == "end" {
            fixed.push(raw.to_string());
            if lines
                .get(i + 1)
                .map(|l| l.trim().starts_with("subgraph"))
                .unwrap_or(false)
            {
                fixed.push(String::new());
            }
            continue;
        }

        let mut line = raw.to_string();
        if stripped.contains("-->") || stripped.contains("--") {
            line = line.replace(" -- ", " --> ");
            line = arrow_re
                .replace_all(&line, |caps: &regex::Captures<'_>| {
                    format!("{} --> {}", clean_node_id(&caps[1]), clean_node_id(&caps[2]))
                })
                .into_owned();
        }

        if stripped.contains('[') && stripped.contains(']') {
            line = Regex::new(r"\[([^\]]*)\s-\s([^\]]*)\]")
                .unwrap()
                .replace_all(&line, "[${1}_${2}]")
                .into_owned();
        }

        fixed.push(line);
    }

    fixed.join("\n")
}

/// Converts parenthesised nodes to bracket nodes and strips file
/// extensions from labels
fn post_process(text: &str) -> String {
    let paren_before = Regex::new(r"\(([^)]+)\)\s*--").unwrap();
    let paren_after = Regex::new(r"-->\s*\(([^)]+)\)").unwrap();
    let extension = Regex::new(r"\[([^\[\]]*)\.(sln|xaml|cs|cpp|h|py|rs|go|js|ts)([^\[\]]*)\]")
        .unwrap();

    text.split('\n')
        .map(|line| {
            let mut line = line.to_string();
            if line.contains("-->") {
                line = paren_before.replace_all(&line, "[$1] --").into_owned();
                line = paren_after.replace_all(&line, "--> [$1]").into_owned();
            }
            if line.contains('[') && line.contains(']') {
                line = extension.replace_all(&line, "[${1}_${2}${3}]").into_owned();
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Restricts a node ID to `[A-Za-z0-9_]` starting with a letter
fn clean_node_id(node_id: &str) -> String {
    let cleaned: String = node_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        return "node".to_string();
    }
    if !cleaned.chars().next().unwrap().is_ascii_alphabetic() {
        return format!("node_{}", cleaned);
    }
    cleaned
}

fn is_valid_diagram(text: &str) -> bool {
    let first = match text.trim().lines().next() {
        Some(l) => l.trim(),
        None => return false,
    };
    VALID_STARTS.iter().any(|start| first.starts_with(start))
}

/// Keeps the head and tail of oversized content with a truncation marker
/// in between
pub fn truncate_middle(content: &str, max_chars: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_chars {
        return content.to_string();
    }
    let half = max_chars / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    tracing::warn!(
        "Truncated prompt content from {} to ~{} chars",
        chars.len(),
        max_chars
    );
    format!("{}\n\n... [CONTENT TRUNCATED] ...\n\n{}", head, tail)
}
