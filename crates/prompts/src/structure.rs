use pw_domain::context::BusinessContext;
use pw_domain::page::SectionKind;

use crate::blocks::format_context;
use crate::Prompt;

/// Comma-separated list of the allowed section kinds.
pub fn section_kind_list() -> String {
    SectionKind::ALL
        .iter()
        .map(SectionKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The JSON shape the model must return for a page outline.
pub fn structure_schema() -> String {
    format!(
        r##"```json
{{
  "title": "Page title",
  "description": "One-sentence summary of the page",
  "sections": [
    {{ "type": "hero", "title": "Section title", "order": 1 }}
  ],
  "colorScheme": {{
    "primary": "#hex",
    "secondary": "#hex",
    "accent": "#hex",
    "background": "#hex",
    "text": "#hex"
  }}
}}
```
"type" must be one of: {kinds}."##,
        kinds = section_kind_list()
    )
}

/// Ask for the page outline as a fenced JSON block.
pub fn structure(context: &BusinessContext, preferences: Option<&str>) -> Prompt {
    let system = format!(
        "\
You are a conversion-focused landing page architect.
Design the section outline for a single marketing landing page.

Rules:
- Start with a hero section and end with a call to action.
- Use between 4 and 8 sections. Order them with ascending \"order\" values starting at 1.
- Pick a color scheme that fits the brand voice and industry.
- Respond with exactly one fenced JSON block in this shape and nothing else:

{schema}

{context}",
        schema = structure_schema(),
        context = format_context(context),
    );

    let mut user = String::from("Create the page structure for this business.");
    if let Some(prefs) = preferences.map(str::trim).filter(|p| !p.is_empty()) {
        user.push_str("\n\nPreferences:\n");
        user.push_str(prefs);
    }

    Prompt { system, user }
}
