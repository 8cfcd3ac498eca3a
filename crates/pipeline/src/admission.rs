use apkforge_protocol::BuildLimit;

use crate::types::PipelineRun;

/// Whether a new run may be launched.
///
/// Refused while `run` is still moving through its stages, and when the
/// account's build limit is reached. An unknown limit does not block.
pub fn can_launch(run: &PipelineRun, limit: Option<&BuildLimit>) -> bool {
    if run.is_in_progress() {
        return false;
    }
    !limit.is_some_and(|l| l.limit_reached)
}
