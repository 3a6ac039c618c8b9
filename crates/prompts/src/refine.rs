use serde::{Deserialize, Serialize};

use crate::Prompt;

/// The fixed set of named copy transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementCommand {
    Shorten,
    Lengthen,
    Formalize,
    Casualize,
    AddUrgency,
    WarmTone,
    AddHumor,
    Simplify,
    EmphasizeBenefits,
    AddSocialProof,
}

impl RefinementCommand {
    pub const ALL: [RefinementCommand; 10] = [
        RefinementCommand::Shorten,
        RefinementCommand::Lengthen,
        RefinementCommand::Formalize,
        RefinementCommand::Casualize,
        RefinementCommand::AddUrgency,
        RefinementCommand::WarmTone,
        RefinementCommand::AddHumor,
        RefinementCommand::Simplify,
        RefinementCommand::EmphasizeBenefits,
        RefinementCommand::AddSocialProof,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementCommand::Shorten => "shorten",
            RefinementCommand::Lengthen => "lengthen",
            RefinementCommand::Formalize => "formalize",
            RefinementCommand::Casualize => "casualize",
            RefinementCommand::AddUrgency => "add_urgency",
            RefinementCommand::WarmTone => "warm_tone",
            RefinementCommand::AddHumor => "add_humor",
            RefinementCommand::Simplify => "simplify",
            RefinementCommand::EmphasizeBenefits => "emphasize_benefits",
            RefinementCommand::AddSocialProof => "add_social_proof",
        }
    }

    /// Accepts the snake_case name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            RefinementCommand::Shorten => {
                "Make the copy about 30% shorter. Keep every key message; cut filler words."
            }
            RefinementCommand::Lengthen => {
                "Expand the copy with more detail and supporting points, about 30% longer."
            }
            RefinementCommand::Formalize => {
                "Rewrite the copy in a professional, formal tone. Avoid slang and contractions."
            }
            RefinementCommand::Casualize => {
                "Rewrite the copy in a relaxed, conversational tone, as if talking to a friend."
            }
            RefinementCommand::AddUrgency => {
                "Add honest urgency: limited availability, timely reasons to act now. No fake countdowns."
            }
            RefinementCommand::WarmTone => {
                "Make the copy warmer and more empathetic. Speak to the reader's feelings."
            }
            RefinementCommand::AddHumor => {
                "Add light, tasteful humor that fits the brand. Never at the customer's expense."
            }
            RefinementCommand::Simplify => {
                "Simplify the language to a 6th-grade reading level. Short sentences, common words."
            }
            RefinementCommand::EmphasizeBenefits => {
                "Reframe features as customer benefits. Lead every point with the outcome."
            }
            RefinementCommand::AddSocialProof => {
                "Weave in social proof: customer counts, short quotes, ratings or recognizable clients."
            }
        }
    }
}

impl std::fmt::Display for RefinementCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ask for the complete updated artifact after one transformation.
///
/// With `target_section` set, only that section's copy may change.
pub fn refinement(
    command: RefinementCommand,
    current_code: &str,
    target_section: Option<&str>,
) -> Prompt {
    let scope = match target_section.map(str::trim).filter(|s| !s.is_empty()) {
        Some(section) => format!(
            "Apply the change ONLY to the \"{section}\" section. Every other section must stay byte-for-byte identical."
        ),
        None => "Apply the change to the copy of every section.".to_string(),
    };

    let system = format!(
        "\
You are refining an existing React landing page.

Transformation ({command}): {instruction}
{scope}

Keep the structure, styling, colors and component layout unchanged; change text only.
Respond with the COMPLETE updated component as exactly one fenced ```tsx code block.",
        instruction = command.instruction(),
    );

    let user = format!("Current code:\n```tsx\n{}\n```", current_code.trim_end());

    Prompt { system, user }
}
