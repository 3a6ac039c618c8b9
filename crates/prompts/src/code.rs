use std::collections::BTreeMap;

use pw_domain::context::BusinessContext;
use pw_domain::page::{PageStructure, SectionContent};

use crate::blocks::{format_context, format_section_contents, format_structure};
use crate::Prompt;

/// Ask for the complete page as one fenced `tsx` block.
pub fn code_generation(
    structure: &PageStructure,
    contents: &BTreeMap<String, SectionContent>,
    context: &BusinessContext,
) -> Prompt {
    let system = format!(
        "\
You are an expert React and Tailwind CSS developer building a production landing page.

Requirements:
- Output ONE complete, self-contained React component as the default export.
- Implement every section listed in PAGE_STRUCTURE, in that order, using its copy from SECTION_COPY.
- Use the color scheme from PAGE_STRUCTURE for backgrounds, text and accents.
- Use Tailwind utility classes only; no external imports besides React.
- Make the layout responsive and accessible (semantic elements, alt text, contrast).
- Do not use placeholder content of any kind: no \"Lorem ipsum\", no \"Your Company\", no TODOs.
- Respond with exactly one fenced ```tsx code block and nothing else.

{context}
{structure}
{copy}",
        context = format_context(context),
        structure = format_structure(structure),
        copy = format_section_contents(structure, contents),
    );

    Prompt {
        system,
        user: format!("Generate the complete code for \"{}\".", structure.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_domain::page::{BannerCopy, PageSection, SectionKind, SectionStatus};

    #[test]
    fn includes_copy_and_forbids_placeholders() {
        let structure = PageStructure {
            title: "Crumb".into(),
            description: "Bakery".into(),
            sections: vec![PageSection {
                id: "section-1".into(),
                kind: SectionKind::Hero,
                title: "Welcome".into(),
                order: 1,
                status: SectionStatus::Complete,
            }],
            color_scheme: None,
            typography: None,
        };
        let mut contents = BTreeMap::new();
        contents.insert(
            "section-1".to_string(),
            SectionContent::Hero(BannerCopy {
                headline: "Bread worth waking up for".into(),
                ..Default::default()
            }),
        );
        let p = code_generation(&structure, &contents, &BusinessContext::default());
        assert!(p.system.contains("Bread worth waking up for"));
        assert!(p.system.contains("placeholder"));
        assert!(p.system.contains("```tsx"));
        assert_eq!(p.user, "Generate the complete code for \"Crumb\".");
    }
}
