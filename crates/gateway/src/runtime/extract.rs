//! Structured extraction: pull fenced blocks out of model text.
//!
//! A response is expected to carry at most one ```json block and at most
//! one ```tsx / ```jsx / ```react block. "No block at all" and "block present
//! but unusable" are distinct errors so callers can tell a chatty answer
//! from a malformed one.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use pw_domain::error::{BlockKind, ExtractionError};
use pw_domain::page::{PageStructure, SectionContent, SectionCopyDraft, SectionKind, StructureDraft};

const JSON_FENCE: &str = r"(?is)```[ \t]*json[ \t]*\r?\n(.*?)```";
const CODE_FENCE: &str = r"(?is)```[ \t]*(?:tsx|jsx|react)[ \t]*\r?\n(.*?)```";
const JSON_OPEN: &str = r"(?i)```[ \t]*json[ \t]*\r?\n";
const CODE_OPEN: &str = r"(?i)```[ \t]*(?:tsx|jsx|react)[ \t]*\r?\n";

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(JSON_FENCE).expect("json fence pattern is valid"))
}

fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CODE_FENCE).expect("code fence pattern is valid"))
}

/// Opening fence with no closing fence after it (response cut short).
fn unterminated(text: &str, block: BlockKind) -> bool {
    static JSON: OnceLock<Regex> = OnceLock::new();
    static CODE: OnceLock<Regex> = OnceLock::new();
    let re = match block {
        BlockKind::Json => {
            JSON.get_or_init(|| Regex::new(JSON_OPEN).expect("json opening pattern is valid"))
        }
        BlockKind::Code => {
            CODE.get_or_init(|| Regex::new(CODE_OPEN).expect("code opening pattern is valid"))
        }
    };
    re.is_match(text)
}

fn fenced(text: &str, block: BlockKind) -> Result<&str, ExtractionError> {
    let re = match block {
        BlockKind::Json => json_fence(),
        BlockKind::Code => code_fence(),
    };
    if let Some(body) = re.captures(text).and_then(|caps| caps.get(1)) {
        return Ok(body.as_str().trim());
    }
    if unterminated(text, block) {
        return Err(ExtractionError::Invalid(format!(
            "fenced {block} block is not terminated"
        )));
    }
    Err(ExtractionError::Missing { block })
}

/// Body of the first ```json block.
pub fn json_block(text: &str) -> Result<&str, ExtractionError> {
    fenced(text, BlockKind::Json)
}

/// Body of the first ```tsx / ```jsx / ```react block.
pub fn code_block(text: &str) -> Result<&str, ExtractionError> {
    let body = fenced(text, BlockKind::Code)?;
    if body.is_empty() {
        return Err(ExtractionError::Invalid("fenced code block is empty".into()));
    }
    Ok(body)
}

/// Parse the ```json block into `T`.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, ExtractionError> {
    let body = json_block(text)?;
    serde_json::from_str(body).map_err(|e| ExtractionError::InvalidJson {
        block: BlockKind::Json,
        reason: e.to_string(),
    })
}

/// Page outline from a structure (or understanding) response.
pub fn parse_structure(text: &str) -> Result<PageStructure, ExtractionError> {
    let draft: StructureDraft = extract_json(text)?;
    PageStructure::try_from(draft)
}

/// One section's copy, typed for the section's kind.
pub fn parse_section_copy(text: &str, kind: SectionKind) -> Result<SectionContent, ExtractionError> {
    let draft: SectionCopyDraft = extract_json(text)?;
    SectionContent::from_draft(kind, draft)
}
