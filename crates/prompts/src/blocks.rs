//! Delimited text blocks shared by the stage prompts.

use std::collections::BTreeMap;

use pw_domain::context::BusinessContext;
use pw_domain::page::{PageStructure, SectionContent};

/// Render the business context, or a marker when nothing is known yet.
pub fn format_context(context: &BusinessContext) -> String {
    let entries = context.entries();
    if entries.is_empty() {
        return "\
=== BUSINESS_CONTEXT ===
[NO CONTEXT PROVIDED]
=== END BUSINESS_CONTEXT ===
"
        .to_string();
    }

    let mut out = String::from("=== BUSINESS_CONTEXT ===\n");
    for (label, value) in entries {
        out.push_str(&format!("- {label}: {value}\n"));
    }
    out.push_str("=== END BUSINESS_CONTEXT ===\n");
    out
}

/// Render the page outline as an ordered section list plus colors.
pub fn format_structure(structure: &PageStructure) -> String {
    let mut out = format!(
        "=== PAGE_STRUCTURE ===\nTitle: {}\nDescription: {}\nSections:\n",
        structure.title, structure.description
    );
    for (idx, section) in structure.ordered_sections().iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} (id: {})\n",
            idx + 1,
            section.kind,
            section.title,
            section.id
        ));
    }
    if let Some(colors) = &structure.color_scheme {
        out.push_str("Color scheme:\n");
        let named = [
            ("primary", &colors.primary),
            ("secondary", &colors.secondary),
            ("accent", &colors.accent),
            ("background", &colors.background),
            ("text", &colors.text),
        ];
        for (name, value) in named {
            if let Some(v) = value {
                out.push_str(&format!("- {name}: {v}\n"));
            }
        }
    }
    if let Some(typography) = &structure.typography {
        if let Some(font) = &typography.heading_font {
            out.push_str(&format!("Heading font: {font}\n"));
        }
        if let Some(font) = &typography.body_font {
            out.push_str(&format!("Body font: {font}\n"));
        }
    }
    out.push_str("=== END PAGE_STRUCTURE ===\n");
    out
}

/// Render the generated copy for every section, in page order.
///
/// Sections without copy are listed with a marker so the code stage writes
/// real copy for them instead of dropping them.
pub fn format_section_contents(
    structure: &PageStructure,
    contents: &BTreeMap<String, SectionContent>,
) -> String {
    let mut out = String::from("=== SECTION_COPY ===\n");
    for section in structure.ordered_sections() {
        out.push_str(&format!(
            "--- {} [{}] (id: {}) ---\n",
            section.title, section.kind, section.id
        ));
        match contents.get(&section.id) {
            Some(content) => {
                let json = serde_json::to_string_pretty(content).unwrap_or_default();
                out.push_str(&json);
                out.push('\n');
            }
            None => out.push_str("[NO COPY GENERATED: write concise copy from the context]\n"),
        }
    }
    out.push_str("=== END SECTION_COPY ===\n");
    out
}
