//! Chapter plan parsing
//!
//! The planning stage asks the model for a four-chapter outline, but the
//! reply is free-form markdown and models are inventive about heading
//! shapes. The parser scans line by line, accepts several heading forms,
//! normalizes titles, and falls back to a fixed skeleton when the reply
//! yields fewer than three usable chapters.

use regex::Regex;

/// One planned chapter: ordering, display title, and a short description
/// that seeds the body prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDescriptor {
    /// 1-based position in the final document
    pub number: usize,
    pub title: String,
    pub description: String,
}

/// Maximum chapters taken from a plan
pub const MAX_CHAPTERS: usize = 4;

/// Plans with fewer accepted chapters than this get the default skeleton
const MIN_CHAPTERS: usize = 3;

const DESCRIPTION_LINES: usize = 3;
const DESCRIPTION_CHARS: usize = 200;

/// Keywords that mark a short line as a chapter heading even without
/// markdown or ordinal markers
const CHAPTER_KEYWORDS: &[&str] = &[
    "overview",
    "architecture",
    "setup",
    "getting started",
    "workflow",
    "implementation",
];

/// Extracts chapter descriptors from a model-produced plan
///
/// Headings are recognized by markdown markers (`##`), leading ordinals
/// (`1.`), a `Chapter N` label, or a known chapter keyword on a short
/// line. Titles are cleaned and deduplicated; descriptions come from the
/// lines that follow each heading. Always returns between 3 and 4
/// chapters with contiguous numbering.
pub fn parse_chapter_plan(plan: &str) -> Vec<ChapterDescriptor> {
    let lines: Vec<&str> = plan.lines().collect();
    let mut chapters: Vec<ChapterDescriptor> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    let mut i = 0;
    while i < lines.len() && chapters.len() < MAX_CHAPTERS {
        let line = lines[i].trim();
        if !is_heading(line) {
            i += 1;
            continue;
        }

        let title = clean_title(line);
        if title.is_empty() {
            i += 1;
            continue;
        }

        let key = dedup_key(&title);
        if seen.contains(&key) {
            i += 1;
            continue;
        }

        // Description: the following non-heading lines, first few only.
        let mut description_lines: Vec<&str> = Vec::new();
        let mut j = i + 1;
        while j < lines.len() && description_lines.len() < DESCRIPTION_LINES {
            let next = lines[j].trim();
            if is_heading(next) {
                break;
            }
            if !next.is_empty() {
                description_lines.push(next);
            }
            j += 1;
        }
        let mut description = description_lines.join(" ");
        if description.len() > DESCRIPTION_CHARS {
            description = format!("{}...", truncate_chars(&description, DESCRIPTION_CHARS));
        }

        seen.push(key);
        chapters.push(ChapterDescriptor {
            number: chapters.len() + 1,
            title,
            description,
        });
        i = j.max(i + 1);
    }

    if chapters.len() < MIN_CHAPTERS {
        tracing::warn!(
            "Chapter plan yielded {} usable chapters, using default skeleton",
            chapters.len()
        );
        return default_chapters();
    }

    chapters
}

/// The fixed three-chapter skeleton used when a plan cannot be parsed
pub fn default_chapters() -> Vec<ChapterDescriptor> {
    vec![
        ChapterDescriptor {
            number: 1,
            title: "Getting Started & Overview".to_string(),
            description: "Introduction to the repository and setup guide".to_string(),
        },
        ChapterDescriptor {
            number: 2,
            title: "Core Architecture & Components".to_string(),
            description: "Understanding the main components and architecture".to_string(),
        },
        ChapterDescriptor {
            number: 3,
            title: "Key Workflows & Implementation".to_string(),
            description: "How the system works and implementation details".to_string(),
        },
    ]
}

fn is_heading(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    if line.starts_with("##") {
        return true;
    }
    let ordinal = Regex::new(r"^\d+\.\s+\S").unwrap();
    if ordinal.is_match(line) {
        return true;
    }
    let labeled = Regex::new(r"(?i)^(?:\*\*)?Chapter\s+\d+").unwrap();
    if labeled.is_match(line) {
        return true;
    }
    // Short standalone lines naming a well-known chapter topic.
    if line.len() < 60 {
        let lower = line.to_lowercase();
        return CHAPTER_KEYWORDS.iter().any(|k| lower.contains(k));
    }
    false
}

/// Strips markdown markers, ordinals, `Chapter N:` labels, and bold
/// wrappers from a heading line
fn clean_title(line: &str) -> String {
    let cleaned = Regex::new(r"^#+\s*").unwrap().replace(line.trim(), "");
    let cleaned = Regex::new(r"^\d+\.\s*").unwrap().replace(&cleaned, "");
    let cleaned = Regex::new(r"(?i)^Chapter\s+\d+:?\s*")
        .unwrap()
        .replace(&cleaned, "");
    let cleaned = Regex::new(r"\*\*([^*]+)\*\*")
        .unwrap()
        .replace_all(&cleaned, "$1");
    cleaned.trim().to_string()
}

fn dedup_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_four_markdown_headings() {
        let plan = "\
# Documentation Structure

## Chapter 1: Getting Started
Covers installation and first steps.

## Chapter 2: Core Architecture
The main components.
And how they fit together.

## Chapter 3: Data Flow
How data moves.

## Chapter 4: Deployment
Shipping it.
";
        let chapters = parse_chapter_plan(plan);
        assert_eq!(chapters.len(), 4);
        assert_eq!(chapters[0].number, 1);
        assert_eq!(chapters[0].title, "Getting Started");
        assert_eq!(chapters[0].description, "Covers installation and first steps.");
        assert_eq!(chapters[1].title, "Core Architecture");
        assert!(chapters[1].description.contains("how they fit together"));
        assert_eq!(chapters[3].title, "Deployment");
    }

    #[test]
    fn test_parse_caps_at_four() {
        let plan = "\
## One Overview
a
## Two Architecture
b
## Three Setup
c
## Four Workflow
d
## Five Implementation
e
";
        let chapters = parse_chapter_plan(plan);
        assert_eq!(chapters.len(), 4);
        assert_eq!(chapters[3].title, "Four Workflow");
    }

    #[test]
    fn test_parse_ordinal_and_bold_headings() {
        let plan = "\
1. **Getting Started**
Install and run.

2. **Architecture Overview**
The pieces.

3. **Implementation Details**
The code.
";
        let chapters = parse_chapter_plan(plan);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Getting Started");
        assert_eq!(chapters[1].title, "Architecture Overview");
    }

    #[test]
    fn test_parse_deduplicates_titles() {
        let plan = "\
## Chapter 1: Overview
a
## Chapter 2: overview
b
## Chapter 3: Architecture
c
## Chapter 4: Setup
d
";
        let chapters = parse_chapter_plan(plan);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Overview", "Architecture", "Setup"]);
    }

    #[test]
    fn test_parse_falls_back_below_three() {
        let plan = "## Only Chapter\nNothing else here.\n";
        let chapters = parse_chapter_plan(plan);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Getting Started & Overview");
        assert_eq!(chapters[2].title, "Key Workflows & Implementation");
    }

    #[test]
    fn test_parse_empty_plan_falls_back() {
        let chapters = parse_chapter_plan("");
        assert_eq!(chapters, default_chapters());
    }

    #[test]
    fn test_description_capped_at_200_chars() {
        let long = "x".repeat(300);
        let plan = format!(
            "## Chapter 1: A Overview\n{long}\n## Chapter 2: B Architecture\nb\n## Chapter 3: C Setup\nc\n"
        );
        let chapters = parse_chapter_plan(&plan);
        assert!(chapters[0].description.len() <= 203);
        assert!(chapters[0].description.ends_with("..."));
    }

    #[test]
    fn test_clean_title_strips_decorations() {
        assert_eq!(clean_title("## Chapter 2: **Core Ideas**"), "Core Ideas");
        assert_eq!(clean_title("3. Setup Guide"), "Setup Guide");
        assert_eq!(clean_title("### Plain Title"), "Plain Title");
    }
}
