use pw_domain::context::BusinessContext;

use crate::blocks::format_context;
use crate::structure::structure_schema;
use crate::Prompt;

/// First-contact prompt: ask clarifying questions, or skip straight to an
/// outline when the context already covers the brand.
pub fn understanding(user_request: &str, context: &BusinessContext) -> Prompt {
    let system = format!(
        "\
You are a marketing strategist helping a small business get a landing page.

Read the request and the business context below.
- If the context does NOT yet tell you who the business is, what it sells and who it sells to,
  ask 2-3 short clarifying questions. Ask nothing else and do not output JSON.
- If the context already covers those points, skip the questions. Reply with one sentence
  confirming your understanding, followed by a page outline as one fenced JSON block:

{schema}

{context}",
        schema = structure_schema(),
        context = format_context(context),
    );

    Prompt {
        system,
        user: user_request.trim().to_string(),
    }
}

/// Free-form assistant turn used by the stateless chat action.
pub fn conversation(context: &BusinessContext) -> String {
    format!(
        "\
You are a friendly landing page copywriter and strategist.
Answer questions about the user's page, suggest improvements and keep replies short.
When you propose page content, use the business context below.

{}",
        format_context(context)
    )
}
