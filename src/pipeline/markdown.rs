//! Markdown cleanup for LLM output
//!
//! Model responses arrive with uneven formatting: malformed headings,
//! inconsistent list markers, missing blank lines around blocks. The
//! cleaner normalizes all of that while keeping code spans byte-for-byte
//! intact by swapping them out for placeholders during the line passes.

use regex::Regex;

/// Report from [`validate_markdown`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownReport {
    /// True when no structural issues were found
    pub valid: bool,
    /// Human-readable issue descriptions
    pub issues: Vec<String>,
}

/// Normalizes markdown produced by the model
///
/// Code blocks and inline code are preserved verbatim; everything else
/// gets heading, list, emphasis, and spacing fixes. The result always
/// starts with a heading (the first line is promoted when short enough)
/// and ends with a single trailing newline.
pub fn clean_markdown(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let code_block_re = Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap();
    let inline_code_re = Regex::new(r"`([^`]+)`").unwrap();

    // Stash code spans behind placeholders so the line passes cannot
    // touch them.
    let mut code_blocks: Vec<String> = Vec::new();
    let content = code_block_re
        .replace_all(content, |caps: &regex::Captures<'_>| {
            code_blocks.push(caps[0].to_string());
            format!("__CODE_BLOCK_{}__", code_blocks.len() - 1)
        })
        .into_owned();

    let mut inline_codes: Vec<String> = Vec::new();
    let content = inline_code_re
        .replace_all(&content, |caps: &regex::Captures<'_>| {
            inline_codes.push(caps[0].to_string());
            format!("__INLINE_CODE_{}__", inline_codes.len() - 1)
        })
        .into_owned();

    let lines: Vec<&str> = content.split('\n').collect();
    let mut cleaned: Vec<String> = Vec::new();
    for (i, raw) in lines.iter().enumerate() {
        if i == 0 && raw.trim().is_empty() {
            continue;
        }
        let line = fix_heading(raw);
        let line = fix_list_item(&line);
        let line = fix_emphasis(&line);
        if !line.trim().is_empty() || (i > 0 && i < lines.len() - 1) {
            cleaned.push(line.trim_end().to_string());
        }
    }
    let content = cleaned.join("\n");
    let mut content = ensure_spacing(&content);

    for (i, block) in code_blocks.iter().enumerate() {
        content = content.replace(&format!("__CODE_BLOCK_{}__", i), block);
    }
    for (i, span) in inline_codes.iter().enumerate() {
        content = content.replace(&format!("__INLINE_CODE_{}__", i), span);
    }

    final_cleanup(&content)
}

/// Reports structural problems without modifying the content
pub fn validate_markdown(content: &str) -> MarkdownReport {
    let mut issues = Vec::new();

    let heading_re = Regex::new(r"(?m)^#{1,6}\s").unwrap();
    if !heading_re.is_match(content) {
        issues.push("No headings found".to_string());
    }

    if content.matches("```").count() % 2 != 0 {
        issues.push("Unclosed code blocks detected".to_string());
    }

    if Regex::new(r"\n{4,}").unwrap().is_match(content) {
        issues.push("Excessive line breaks found".to_string());
    }

    MarkdownReport {
        valid: issues.is_empty(),
        issues,
    }
}

/// Collapses heading markers to `#{1,6} text` with no trailing hashes
fn fix_heading(line: &str) -> String {
    if !line.starts_with('#') {
        return line.to_string();
    }
    let re = Regex::new(r"^(#{1,6})\s*(.+)").unwrap();
    match re.captures(line) {
        Some(caps) => {
            let level = caps[1].len();
            let text = caps[2].trim();
            let text = Regex::new(r"\s*#+\s*$").unwrap().replace(text, "");
            format!("{} {}", "#".repeat(level), text)
        }
        None => line.to_string(),
    }
}

/// Normalizes bullet markers to `- ` and numbered items to `1. `
fn fix_list_item(line: &str) -> String {
    let line = Regex::new(r"^\s*[*\-+]\s+")
        .unwrap()
        .replace(line, "- ")
        .into_owned();
    Regex::new(r"^(\s*)\d+\.\s+")
        .unwrap()
        .replace(&line, "${1}1. ")
        .into_owned()
}

/// Trims stray spaces inside `**bold**` and `*italic*` spans
fn fix_emphasis(line: &str) -> String {
    let line = Regex::new(r"\*\*\s+([^*]+)\s+\*\*")
        .unwrap()
        .replace_all(line, "**$1**")
        .into_owned();
    Regex::new(r"\*\s+([^*]+)\s+\*")
        .unwrap()
        .replace_all(&line, "*$1*")
        .into_owned()
}

/// Guarantees blank lines around headings and fenced blocks, and caps
/// consecutive blank lines at one
fn ensure_spacing(content: &str) -> String {
    let content = Regex::new(r"([^\n])\n(#{1,6}\s)")
        .unwrap()
        .replace_all(content, "$1\n\n$2")
        .into_owned();
    let content = Regex::new(r"([^\n])\n```")
        .unwrap()
        .replace_all(&content, "$1\n\n```")
        .into_owned();
    let content = Regex::new(r"```\n([^\n])")
        .unwrap()
        .replace_all(&content, "```\n\n$1")
        .into_owned();
    Regex::new(r"\n{3,}")
        .unwrap()
        .replace_all(&content, "\n\n")
        .into_owned()
}

fn final_cleanup(content: &str) -> String {
    let mut content = content.trim().to_string();

    if !content.starts_with('#') {
        let mut lines: Vec<String> = content.split('\n').map(|l| l.to_string()).collect();
        if let Some(first) = lines.first_mut() {
            let title = first.trim().to_string();
            if !title.is_empty() && title.len() < 100 {
                *first = format!("# {}", title);
                content = lines.join("\n");
            }
        }
    }

    let content: String = content
        .split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n", content.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_preserves_code_blocks() {
        let input = "# Title\n\nSome text\n\n```rust\nlet   x = 1;   \n```\n";
        let out = clean_markdown(input);
        assert!(out.contains("let   x = 1;   \n```"));
    }

    #[test]
    fn test_clean_normalizes_headings() {
        let out = clean_markdown("##   Overview  ##\nbody");
        assert!(out.contains("## Overview"));
        assert!(!out.contains("Overview  ##"));
    }

    #[test]
    fn test_clean_normalizes_lists() {
        let out = clean_markdown("# T\n\n* first\n+ second\n3. third");
        assert!(out.contains("- first"));
        assert!(out.contains("- second"));
        assert!(out.contains("1. third"));
    }

    #[test]
    fn test_clean_promotes_first_line_to_heading() {
        let out = clean_markdown("Getting Started\n\nSome intro text.");
        assert!(out.starts_with("# Getting Started"));
    }

    #[test]
    fn test_clean_collapses_blank_lines_and_trailing_newline() {
        let out = clean_markdown("# A\n\n\n\n\nB");
        assert_eq!(out, "# A\n\nB\n");
    }

    #[test]
    fn test_clean_adds_spacing_around_headings() {
        let out = clean_markdown("# A\nbody\n## B\nmore");
        assert!(out.contains("body\n\n## B"));
    }

    #[test]
    fn test_clean_fixes_emphasis_spacing() {
        let out = clean_markdown("# T\n\nthis is **  bold  ** text");
        assert!(out.contains("**bold**"));
    }

    #[test]
    fn test_clean_empty_input() {
        assert_eq!(clean_markdown(""), "");
    }

    #[test]
    fn test_validate_flags_missing_headings() {
        let report = validate_markdown("just prose\n");
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("No headings")));
    }

    #[test]
    fn test_validate_flags_unclosed_code_block() {
        let report = validate_markdown("# T\n\n```rust\nlet x = 1;\n");
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("Unclosed")));
    }

    #[test]
    fn test_validate_clean_document() {
        let report = validate_markdown("# T\n\nbody\n");
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }
}
