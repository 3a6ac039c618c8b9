use pw_domain::context::BusinessContext;
use pw_domain::page::{PageStructure, SectionKind};

use crate::blocks::{format_context, format_structure};
use crate::Prompt;

const COPY_SCHEMA: &str = r##"```json
{
  "headline": "Required headline",
  "subheadline": "Optional supporting line",
  "body": "Optional paragraph",
  "items": [{ "title": "Item title", "description": "Item text", "icon": "optional-icon-name" }],
  "cta": { "text": "Button label", "url": "#optional-anchor" }
}
```"##;

/// Writing guidance for one section kind.
pub fn guidance(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Hero => "\
Write a hero banner. The headline states the core promise in under 10 words.
The subheadline explains who it is for and why it matters. Include one primary cta.",
        SectionKind::Features => "\
List 3-6 concrete features as items. Each item title names the feature; the description
says what it does in one sentence. Suggest a simple icon name per item.",
        SectionKind::Benefits => "\
List 3-5 outcomes the customer gets as items. Lead with the result, not the mechanism.
Each description connects the benefit to the target audience's situation.",
        SectionKind::Testimonials => "\
Write 3 believable testimonials as items. Item title is the customer name and role;
description is the quote, specific and under 40 words. Avoid superlatives.",
        SectionKind::Pricing => "\
Write 2-3 plans as items. Item title is the plan name with its price; description lists
what is included. Add a cta that invites the visitor to pick a plan.",
        SectionKind::Faq => "\
Write 4-6 frequently asked questions as items. Item title is the question; description is
a direct answer in 1-3 sentences that removes a purchase objection.",
        SectionKind::Cta => "\
Write a closing call to action. The headline creates urgency without pressure; the body is
one short reassuring sentence. The cta text starts with a verb.",
        SectionKind::About => "\
Tell the business story in the body: origin, mission and what makes it different, in
2 short paragraphs. The headline is personal rather than corporate.",
        SectionKind::Team => "\
Introduce 3-4 team members as items. Item title is name and role; description is one
human detail that builds trust.",
        SectionKind::Contact => "\
Invite the visitor to get in touch. The body says what happens after they reach out and how
fast. The cta text names the contact action.",
        SectionKind::Gallery => "\
Write a short headline for an image gallery. Items are captions: title names what is shown,
description adds one line of context.",
        SectionKind::Stats => "\
Write 3-4 credibility numbers as items. Item title is the figure (e.g. \"2,000+\");
description says what it counts. Keep numbers plausible for the business size.",
        SectionKind::Process => "\
Describe how it works in 3-4 steps as items. Item title is the step name starting with a verb;
description explains the step in one sentence.",
        SectionKind::Comparison => "\
Compare this business with the usual alternative as items. Item title is the criterion;
description contrasts the two in one sentence, fairly.",
        SectionKind::Custom => "\
Write copy that fits the section title. Use whichever fields make sense.",
    }
}

/// Ask for one section's copy as a fenced JSON block.
pub fn section_copy(
    kind: SectionKind,
    section_title: &str,
    context: &BusinessContext,
    structure: &PageStructure,
) -> Prompt {
    let system = format!(
        "\
You are a senior conversion copywriter writing one section of a landing page.
Match the brand voice, write for the target audience, and never use placeholder text
such as \"Lorem ipsum\" or \"Your Company\".

Section guidance ({kind}):
{guidance}

Respond with exactly one fenced JSON block in this shape and nothing else. Omit fields
the guidance does not call for:

{COPY_SCHEMA}

{context}
{structure}",
        guidance = guidance(kind),
        context = format_context(context),
        structure = format_structure(structure),
    );

    Prompt {
        system,
        user: format!("Write the copy for the \"{section_title}\" section ({kind})."),
    }
}
