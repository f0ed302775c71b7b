//! Prompt builders for the documentation and diagram pipelines
//!
//! Each stage gets one builder function. Prompts instruct the model to
//! emit clean markdown (or bare mermaid code) so the downstream cleaners
//! have less to repair.

use crate::pipeline::chapters::ChapterDescriptor;

/// Comprehensive repository summary (stage 1)
pub fn comprehensive_summary(content: &str) -> String {
    format!(
        "You are creating documentation for developers. Output ONLY clean, properly formatted markdown.\n\
         \n\
         FORMATTING RULES:\n\
         - Use proper markdown headings (# for h1, ## for h2, etc.)\n\
         - Code blocks must use triple backticks with language identifier\n\
         - Lists should use - for bullets or 1. for numbered\n\
         - NO raw HTML, NO mixed formatting\n\
         \n\
         Analyze this repository and create a comprehensive summary:\n\
         \n\
         Repository Content:\n{content}\n\
         \n\
         Create a well-structured summary covering:\n\
         1. Purpose & Overview\n\
         2. Architecture & Structure\n\
         3. Key Technologies\n\
         4. Main Components\n\
         5. Data Flow\n\
         6. External Dependencies\n\
         7. Configuration & Setup\n\
         \n\
         Output clean markdown only. Start with # Repository Overview\n"
    )
}

/// Key abstraction list (stage 2)
pub fn identify_abstractions(content: &str) -> String {
    format!(
        "Analyze the codebase/repository context.\n\
         Identify the top 5-10 core most important abstractions to help those new to the codebase.\n\
         \n\
         For each abstraction, provide:\n\
         1. A concise name\n\
         2. A beginner-friendly description explaining what it is, in around 100 words.\n\
         Output ONLY clean, properly formatted markdown.\n\
         \n\
         Repository Content:\n{content}\n\
         \n\
         Output format:\n\
         # Key Abstractions\n\
         \n\
         ## 1. [Abstraction Name]\n\
         - **Description**: Brief description\n\
         - **Location**: Where to find it\n\
         - **Importance**: Why it matters\n\
         \n\
         Use proper markdown formatting. No HTML, no mixed formatting.\n"
    )
}

/// Relationship analysis between abstractions (stage 3)
pub fn analyze_relationships(abstractions: &str, summary: &str) -> String {
    format!(
        "You are creating documentation for developers. Output ONLY clean, properly formatted markdown.\n\
         \n\
         Based on the following abstractions and the repository summary, analyze component relationships:\n\
         \n\
         Key Abstractions:\n{abstractions}\n\
         \n\
         Repository Summary:\n{summary}\n\
         \n\
         IMPORTANT: Make sure EVERY abstraction is involved in at least ONE relationship.\n\
         Create a relationship analysis with:\n\
         \n\
         # Component Relationships\n\
         \n\
         ## Dependencies\n\
         - Component A -> Component B (reason)\n\
         \n\
         ## Data Flow\n\
         1. Step-by-step data flow\n\
         \n\
         ## Communication Patterns\n\
         - Pattern description\n\
         \n\
         Use proper markdown formatting. Code examples use ```language blocks.\n"
    )
}

/// Chapter plan requesting exactly four chapters (stage 4)
pub fn chapter_plan(abstractions: &str, relationships: &str) -> String {
    format!(
        "You are creating documentation for developers. Figure out the most logical order to teach\n\
         the abstractions and relationships: start from foundational concepts and build up to the\n\
         full system. Output ONLY clean, properly formatted markdown.\n\
         Create EXACTLY 4 chapters based on:\n\
         \n\
         Abstractions:\n{abstractions}\n\
         \n\
         Relationships:\n{relationships}\n\
         \n\
         Output format:\n\
         # Documentation Structure\n\
         \n\
         ## Chapter 1: [Title]\n\
         Description of what this chapter covers...\n\
         \n\
         ## Chapter 2: [Title]\n\
         Description of what this chapter covers...\n\
         \n\
         ## Chapter 3: [Title]\n\
         Description of what this chapter covers...\n\
         \n\
         ## Chapter 4: [Title]\n\
         Description of what this chapter covers...\n\
         \n\
         Use clear, descriptive titles.\n"
    )
}

/// Introduction page (stage 6)
pub fn introduction(summary: &str, abstractions: &str, repo_url: &str) -> String {
    format!(
        "You are creating the introduction page for technical documentation. Output ONLY clean,\n\
         properly formatted markdown.\n\
         \n\
         Repository: {repo_url}\n\
         Summary: {summary}\n\
         Abstractions: {abstractions}\n\
         \n\
         Create an introduction with these sections:\n\
         \n\
         # Introduction\n\
         \n\
         ## Overview\n\
         What this repository does and who should use it...\n\
         \n\
         ## Quick Start\n\
         Basic setup steps...\n\
         \n\
         ## Repository Structure\n\
         \n\
         ## Prerequisites\n\
         \n\
         ## Getting Started\n\
         \n\
         Output clean markdown only. Use proper headings, code blocks, and lists.\n"
    )
}

/// One chapter body (stage 8)
pub fn chapter_body(
    chapter: &ChapterDescriptor,
    abstractions: &str,
    relationships: &str,
    summary: &str,
    repo_url: &str,
) -> String {
    format!(
        "You are writing Chapter {number} of a technical tutorial. Output ONLY clean,\n\
         well-structured markdown. Explain this part of the system to junior developers in a way\n\
         that is beginner-friendly, yet thorough. Treat this as a guided code walkthrough.\n\
         \n\
         FORMATTING RULES:\n\
         1. Start with # {title}\n\
         2. Use ## for major sections, ### for subsections\n\
         3. Code blocks must use ```language syntax and stay under 20 lines\n\
         4. Bold important terms with **text**\n\
         5. NO HTML, NO raw formatting\n\
         \n\
         Chapter: {title}\n\
         Description: {description}\n\
         \n\
         Context:\n\
         - Repository: {repo_url}\n\
         - Summary: {summary}\n\
         - Abstractions: {abstractions}\n\
         - Relationships: {relationships}\n\
         \n\
         Walk through the logic step by step, show small real code snippets, explain tricky logic\n\
         clearly, and finish with a brief summary. Output clean markdown only, starting with the\n\
         chapter title as an # heading.\n",
        number = chapter.number,
        title = chapter.title,
        description = chapter.description,
    )
}

/// Architecture flowchart (diagram pipeline)
pub fn architecture_diagram(repo_url: &str, summary: &str, tree: &str, content: &str) -> String {
    format!(
        "You are a technical architect creating mermaid diagrams. Generate ONLY the mermaid code\n\
         for a high-level architecture diagram.\n\
         \n\
         Repository: {repo_url}\n\
         Summary: {summary}\n\
         Tree Structure: {tree}\n\
         Content: {content}\n\
         \n\
         Create a flowchart diagram showing entry points, core components, persistence layers,\n\
         external dependencies, and the key data flows between them.\n\
         \n\
         STRICT SYNTAX RULES:\n\
         - Use only letters, numbers, underscores in node IDs\n\
         - Use simple arrow syntax: A --> B\n\
         - Always put a blank line after 'end' before the next subgraph\n\
         - Maximum 12 nodes\n\
         \n\
         Output ONLY the mermaid flowchart code, no markdown blocks, no explanations.\n"
    )
}

/// Data-flow flowchart (diagram pipeline)
pub fn data_flow_diagram(
    repo_url: &str,
    summary: &str,
    abstractions: &str,
    relationships: &str,
) -> String {
    format!(
        "You are creating a mermaid data flow diagram. Generate ONLY the mermaid code.\n\
         \n\
         Repository: {repo_url}\n\
         Summary: {summary}\n\
         Abstractions: {abstractions}\n\
         Relationships: {relationships}\n\
         \n\
         Create a flowchart LR showing where data enters the system, how it is transformed, where\n\
         it is stored, and what is returned.\n\
         \n\
         STRICT SYNTAX RULES:\n\
         - Use only letters, numbers, underscores in node IDs\n\
         - Use simple arrow syntax: A --> B\n\
         - Use [(Database)] for storage, [Process] for operations\n\
         - Maximum 10 nodes\n\
         \n\
         Output ONLY the mermaid flowchart code, no markdown blocks, no explanations.\n"
    )
}

/// Component relationship graph (diagram pipeline)
pub fn component_diagram(abstractions: &str, relationships: &str) -> String {
    format!(
        "You are creating a mermaid component relationship diagram. Generate ONLY the mermaid code.\n\
         \n\
         Abstractions: {abstractions}\n\
         Relationships: {relationships}\n\
         \n\
         Create a graph TD showing the main classes/modules as nodes and their dependencies as\n\
         edges. Use solid arrows --> for strong dependencies and dotted arrows -.-> for weak ones.\n\
         Group related components in subgraphs by layer. Maximum 12 nodes. Show actual module\n\
         names from the codebase.\n\
         \n\
         Output ONLY the mermaid graph code, no markdown blocks, no explanations.\n"
    )
}

/// Sequence diagram of the main user workflow (diagram pipeline)
pub fn sequence_diagram(repo_url: &str, abstractions: &str, relationships: &str) -> String {
    format!(
        "You are creating a mermaid sequence diagram. Generate ONLY the mermaid code.\n\
         \n\
         Repository: {repo_url}\n\
         Abstractions: {abstractions}\n\
         Relationships: {relationships}\n\
         \n\
         Create a sequenceDiagram showing one typical user workflow: the client initiating a\n\
         request, the main components processing it, external interactions, and the response flow.\n\
         Use ->> for requests and -->> for responses. Maximum 10 interactions.\n\
         \n\
         Output ONLY the mermaid sequenceDiagram code, no markdown blocks, no explanations.\n"
    )
}

/// File-structure flowchart (diagram pipeline)
pub fn file_structure_diagram(tree: &str) -> String {
    format!(
        "You are creating a mermaid file structure diagram. Generate ONLY the mermaid code.\n\
         \n\
         File Tree Structure:\n{tree}\n\
         \n\
         Create a flowchart TD showing the important folders and key files. Skip vendored and\n\
         generated directories. Group related folders in subgraphs. Maximum 15 nodes.\n\
         \n\
         Output ONLY the mermaid flowchart code, no markdown blocks, no explanations.\n"
    )
}

/// Context message seeding a chat conversation with the session payload
pub fn chat_context_message(summary: &str, tree: &str, content: &str) -> String {
    format!(
        "You are an AI assistant specialized in helping with code repositories. The following is\n\
         a summary, structure, and content of a repository that I want you to become an expert\n\
         on. I will ask you questions about this codebase, and you should use this context to\n\
         provide accurate answers.\n\
         \n\
         REPOSITORY SUMMARY:\n{summary}\n\
         \n\
         REPOSITORY STRUCTURE:\n{tree}\n\
         \n\
         REPOSITORY CONTENT:\n{content}\n\
         \n\
         Please confirm you've processed this repository information.\n"
    )
}
