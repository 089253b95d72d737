//! Prompt composition for specification generation.
//!
//! The generation provider receives `SYSTEM_PROMPT`, a newline, then the
//! composed idea text built here. Composition happens once, on the server.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SpecsheetError};

pub const SYSTEM_PROMPT: &str = r#"You are a senior software architect.
Turn the product idea and the selected options below into a software
specification (`basic_design.md`) that a team can start implementing from
immediately. Output Markdown only. No commentary, no notes outside the document.

## Required sections, in this order
1. Overview
2. Goals
3. System scope
4. Technology stack (pin versions)
5. Architecture
6. Directory layout
7. Functional requirements (table with use-case IDs)
8. Non-functional requirements (performance, security, operations, cost)
9. Infrastructure and CI/CD (Terraform, GitHub Actions, Cloud Build)
10. Development runbook (CLI only, no OS-specific commands)
11. Delivery plan
12. Extension plan

## Rules
- Reflect the selected deploy environment and product type; omit anything irrelevant to them.
- CLI first: show runnable commands in `bash` code blocks, never GUI steps.
- State that the UI uses exactly two colours: white (#FFFFFF) and black (#000000).
- Include a `.env.example` style table; every value is a `YOUR_...` placeholder.
- Prefer current recommended versions, SLSA, SBOM, row-level security and OIDC workload identity.
- Review your own output before answering; add a `TODO:` line for anything missing.
- Stay under roughly 200 lines and 10 000 characters. Prefer bullet lists."#;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductType {
    WebApp,
    AiAgent,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployEnvironment {
    Vercel,
    Gcp,
    Azure,
    Aws,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Typescript,
    Nodejs,
    Python,
    Go,
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProductType::WebApp => "Web app",
            ProductType::AiAgent => "AI agent",
            ProductType::Other => "Other",
        })
    }
}

impl fmt::Display for DeployEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeployEnvironment::Vercel => "Vercel",
            DeployEnvironment::Gcp => "GCP",
            DeployEnvironment::Azure => "Azure",
            DeployEnvironment::Aws => "AWS",
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Typescript => "TypeScript",
            Language::Nodejs => "Node.js",
            Language::Python => "Python",
            Language::Go => "Go",
        })
    }
}

/// User-selected generation options. All optional; absent ones are omitted
/// from the composed idea.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    #[serde(default)]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub deploy_environment: Option<DeployEnvironment>,
    #[serde(default)]
    pub language: Option<Language>,
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Trim and bound the raw idea text.
pub fn validate_idea(idea: &str, max_chars: usize) -> Result<&str> {
    let idea = idea.trim();
    if idea.is_empty() {
        return Err(SpecsheetError::validation("productIdea is required"));
    }
    let chars = idea.chars().count();
    if chars > max_chars {
        return Err(SpecsheetError::validation(format!(
            "productIdea is too long ({chars} characters, limit {max_chars})"
        )));
    }
    Ok(idea)
}

/// Render the idea plus any selected options as the user part of the prompt.
pub fn compose_idea(idea: &str, options: &GenerationOptions) -> String {
    let mut out = format!("Product idea: {}", idea.trim());
    if let Some(t) = options.product_type {
        out.push_str(&format!("\nProduct type: {t}"));
    }
    if let Some(d) = options.deploy_environment {
        out.push_str(&format!("\nDeploy environment: {d}"));
    }
    if let Some(l) = options.language {
        out.push_str(&format!("\nLanguage: {l}"));
    }
    out
}

/// Remove a leading ```` ```markdown ```` fence line and a trailing ```` ``` ```` line.
pub fn strip_fences(text: &str) -> String {
    let mut body = text;
    if let Some(rest) = body.strip_prefix("```markdown") {
        if let Some(pos) = rest.find('\n') {
            if rest[..pos].trim().is_empty() {
                body = &rest[pos + 1..];
            }
        }
    }
    let trimmed = body.trim_end();
    if let Some(rest) = trimmed.strip_suffix("```") {
        if rest.is_empty() || rest.ends_with('\n') {
            return rest.trim_end_matches('\n').to_string();
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_includes_selected_options_once() {
        let opts = GenerationOptions {
            product_type: Some(ProductType::WebApp),
            deploy_environment: Some(DeployEnvironment::Gcp),
            language: Some(Language::Nodejs),
        };
        let text = compose_idea("  a todo app ", &opts);
        assert_eq!(
            text,
            "Product idea: a todo app\nProduct type: Web app\nDeploy environment: GCP\nLanguage: Node.js"
        );
    }

    #[test]
    fn compose_without_options_is_just_the_idea() {
        assert_eq!(
            compose_idea("a todo app", &GenerationOptions::default()),
            "Product idea: a todo app"
        );
    }

    #[test]
    fn options_deserialize_from_ui_values() {
        let opts: GenerationOptions = serde_json::from_str(
            r#"{"productType":"aiAgent","deployEnvironment":"aws","language":"typescript"}"#,
        )
        .unwrap();
        assert_eq!(opts.product_type, Some(ProductType::AiAgent));
        assert_eq!(opts.deploy_environment, Some(DeployEnvironment::Aws));
        assert_eq!(opts.language, Some(Language::Typescript));
    }

    #[test]
    fn validate_rejects_blank_and_oversized() {
        assert!(validate_idea("   ", 10).is_err());
        assert!(validate_idea("abcdefghijk", 10).is_err());
        assert_eq!(validate_idea(" todo ", 10).unwrap(), "todo");
    }

    #[test]
    fn validate_counts_characters_not_bytes() {
        // 4 characters, 12 bytes
        assert!(validate_idea("日本語版", 4).is_ok());
    }

    #[test]
    fn strip_fences_removes_markdown_wrapper() {
        let raw = "```markdown\n# Spec\n\nbody\n```\n";
        assert_eq!(strip_fences(raw), "# Spec\n\nbody");
    }

    #[test]
    fn strip_fences_leaves_inner_code_blocks() {
        let raw = "# Spec\n```bash\ncargo run\n```\nmore text";
        assert_eq!(strip_fences(raw), raw);
    }

    #[test]
    fn strip_fences_plain_text_untouched() {
        assert_eq!(strip_fences("# Spec"), "# Spec");
    }
}
