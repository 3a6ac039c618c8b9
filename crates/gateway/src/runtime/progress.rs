//! Informational progress percentages per stage.
//!
//! Nothing branches on these values; the session keeps a running maximum
//! so the reported figure never goes backwards.

use pw_domain::workflow::Stage;

const COPY_START: u8 = 20;
const COPY_END: u8 = 60;

/// Milestone reached on entering `stage`.
pub fn for_stage(stage: Stage) -> u8 {
    match stage {
        Stage::Idle | Stage::Understanding => 0,
        Stage::Clarifying => 5,
        Stage::GeneratingStructure => 10,
        Stage::GeneratingCopy => COPY_START,
        Stage::ApplyingStyles => 70,
        Stage::Previewing => 95,
        Stage::Complete => 100,
        Stage::Error => 0,
    }
}

/// Progress after `done` of `total` sections have been attempted.
pub fn for_copy(done: usize, total: usize) -> u8 {
    if total == 0 {
        return COPY_END;
    }
    let done = done.min(total);
    let span = usize::from(COPY_END - COPY_START);
    COPY_START + (span * done / total) as u8
}
