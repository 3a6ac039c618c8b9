use serde::{Deserialize, Serialize};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Active,
    /// Reserved; nothing sets it today.
    Paused,
    Complete,
    Error,
}

/// Position in the generation workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Idle,
    Understanding,
    Clarifying,
    GeneratingStructure,
    GeneratingCopy,
    ApplyingStyles,
    Previewing,
    Complete,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Understanding => "understanding",
            Stage::Clarifying => "clarifying",
            Stage::GeneratingStructure => "generating-structure",
            Stage::GeneratingCopy => "generating-copy",
            Stage::ApplyingStyles => "applying-styles",
            Stage::Previewing => "previewing",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }

    /// Position along the forward path. `Error` sits outside it.
    fn rank(&self) -> Option<u8> {
        Some(match self {
            Stage::Idle => 0,
            Stage::Understanding => 1,
            Stage::Clarifying => 2,
            Stage::GeneratingStructure => 3,
            Stage::GeneratingCopy => 4,
            Stage::ApplyingStyles => 5,
            Stage::Previewing => 6,
            Stage::Complete => 7,
            Stage::Error => return None,
        })
    }

    /// Forward moves (or staying put) are always allowed; `Error` is reachable
    /// from any non-terminal stage; `Complete` may re-enter copy or styling for
    /// refine/regenerate. Leaving `Error` goes through recovery, not here.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        match (self.rank(), next.rank()) {
            (None, _) => false,
            (Some(_), None) => *self != Stage::Complete,
            (Some(cur), Some(nxt)) => {
                nxt >= cur
                    || (*self == Stage::Complete
                        && matches!(next, Stage::GeneratingCopy | Stage::ApplyingStyles))
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
